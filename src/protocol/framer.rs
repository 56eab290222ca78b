//! Wire framer
//!
//! Turns a [`Message`] into a length-prefixed frame and back.
//!
//! ## Frame Format
//! ```text
//! ┌────────────┬──────────┬─────────────────────────────┐
//! │ Length (8) │ Type (4) │         Payload             │
//! └────────────┴──────────┴─────────────────────────────┘
//!              └──────── Length bytes ────────────────┘
//! ```
//!
//! Length and type are in host byte order.

use std::io::{Read, Write};

use crate::error::{NetError, Result};
use crate::message::Message;

/// Header size: 8 byte body length
pub const FRAME_HEADER_SIZE: usize = 8;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a message as a complete frame
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let body = message.serialize();

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u64).to_ne_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Write a message frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let frame = encode_frame(message);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Read one frame body from a stream
///
/// Blocks until the header and the full body have arrived. A stream that
/// ends before the header, or a header announcing an empty body, yields
/// `ConnectionClosed`. A header announcing more than `max_frame_size` bytes
/// yields `FrameTooLarge` without reading the body.
pub fn read_frame_body<R: Read>(reader: &mut R, max_frame_size: u64) -> Result<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            NetError::ConnectionClosed
        } else {
            NetError::Io(e)
        }
    })?;

    let body_len = u64::from_ne_bytes(header);
    if body_len == 0 {
        return Err(NetError::ConnectionClosed);
    }
    if body_len > max_frame_size {
        return Err(NetError::FrameTooLarge {
            size: body_len,
            max: max_frame_size,
        });
    }

    let mut body = vec![0u8; body_len as usize];
    reader.read_exact(&mut body)?;

    Ok(body)
}

/// Decode a frame body into a message
pub fn decode_frame(body: &[u8]) -> Result<Message> {
    Message::from_bytes(body)
}

/// Read and decode one frame
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: u64) -> Result<Message> {
    let body = read_frame_body(reader, max_frame_size)?;
    decode_frame(&body)
}
