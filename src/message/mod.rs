//! Message Module
//!
//! A typed message with a flat binary payload.
//!
//! ## Serialized Form
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Type (4) │         Payload             │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! Values are appended with [`Message::push`] and read back in the same
//! order with [`Message::pop`]. The read cursor is independent of the
//! payload end and only moves forward on a successful read.

mod codec;

use std::fmt;
use std::mem::size_of;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{NetError, Result};

pub use codec::{Decode, Encode, LENGTH_PREFIX_SIZE};

/// Application-defined message kind
pub type MessageType = i32;

/// Size of the serialized type field
pub const TYPE_SIZE: usize = size_of::<MessageType>();

/// A typed message carrying an ordered binary payload
pub struct Message {
    /// Message kind, used to pick the action on dispatch
    msg_type: MessageType,

    /// Appended values, in append order
    payload: Vec<u8>,

    /// Read cursor into `payload`
    read_pos: usize,
}

impl Message {
    /// Create an empty message of the given type
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            payload: Vec::new(),
            read_pos: 0,
        }
    }

    /// Build a message from its serialized form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut message = Self::new(0);
        message.deserialize(bytes)?;
        Ok(message)
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    /// Raw payload bytes, excluding the type field
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Bytes left between the read cursor and the end of the payload
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.read_pos
    }

    // =========================================================================
    // Typed appends / reads
    // =========================================================================

    /// Append a value to the payload
    pub fn push<T: Encode>(&mut self, value: T) -> &mut Self {
        value.encode(&mut self.payload);
        self
    }

    /// Read the next value from the cursor
    ///
    /// Fails with `DeserializationFailed` if the remaining bytes cannot hold
    /// a `T`; the cursor is left where it was.
    pub fn pop<T: Decode>(&mut self) -> Result<T> {
        self.read_with(T::decode)
    }

    /// Append any serde value as a bincode-encoded, length-prefixed block
    pub fn push_serde<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        let encoded =
            bincode::serialize(value).map_err(|e| NetError::Serialization(e.to_string()))?;
        codec::put_block(&mut self.payload, &encoded);
        Ok(self)
    }

    /// Read a value appended with [`push_serde`](Self::push_serde)
    pub fn pop_serde<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.read_with(|buf| {
            let block = codec::take_block(buf)?;
            bincode::deserialize(block)
                .map_err(|e| NetError::DeserializationFailed(e.to_string()))
        })
    }

    /// Move the read cursor back to the start of the payload
    pub fn reset_read(&mut self) {
        self.read_pos = 0;
    }

    fn read_with<T>(&mut self, read: impl FnOnce(&mut &[u8]) -> Result<T>) -> Result<T> {
        let mut remaining = &self.payload[self.read_pos..];
        let before = remaining.len();
        let value = read(&mut remaining)?;
        self.read_pos += before - remaining.len();
        Ok(value)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Type field followed by the full payload, regardless of the cursor
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TYPE_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.msg_type.to_ne_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Replace type and payload with the contents of `bytes`
    ///
    /// Leaves the message untouched if `bytes` cannot hold the type field.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < TYPE_SIZE {
            return Err(NetError::DeserializationFailed(format!(
                "data too short for message type: {} bytes",
                bytes.len()
            )));
        }

        let (type_bytes, payload) = bytes.split_at(TYPE_SIZE);
        let mut raw = [0u8; TYPE_SIZE];
        raw.copy_from_slice(type_bytes);

        self.msg_type = MessageType::from_ne_bytes(raw);
        self.payload.clear();
        self.payload.extend_from_slice(payload);
        self.read_pos = 0;
        Ok(())
    }
}

impl Clone for Message {
    /// Copies type and payload; the copy starts reading from the beginning
    fn clone(&self) -> Self {
        Self {
            msg_type: self.msg_type,
            payload: self.payload.clone(),
            read_pos: 0,
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.msg_type == other.msg_type && self.payload == other.payload
    }
}

impl Eq for Message {}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("msg_type", &self.msg_type)
            .field("len", &self.payload.len())
            .field("read_pos", &self.read_pos)
            .finish()
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(0)
    }
}
