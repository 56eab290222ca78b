//! Value codec
//!
//! [`Encode`] and [`Decode`] implementations for the types a
//! [`Message`](super::Message) payload can carry.
//!
//! ## Layout
//! - Fixed-size scalars are copied verbatim in host byte order.
//! - `bool` is a single byte, `0` or `1`.
//! - `usize`/`isize` travel as 64-bit values.
//! - Strings and byte blobs carry a `u64` length prefix (host byte order)
//!   followed by the raw bytes.

use std::mem::size_of;

use bytes::{Buf, BufMut};

use crate::error::{NetError, Result};

/// Size of the length prefix in front of variable-length fields
pub const LENGTH_PREFIX_SIZE: usize = size_of::<u64>();

/// A value that can be appended to a message payload
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// A value that can be read back from a message payload
///
/// `decode` consumes from the front of `buf`. On error the caller discards
/// whatever was consumed, so implementations need not restore `buf`.
pub trait Decode: Sized {
    fn decode(buf: &mut &[u8]) -> Result<Self>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, buf: &mut Vec<u8>) {
        (**self).encode(buf)
    }
}

fn ensure_remaining(buf: &[u8], needed: usize, what: &str) -> Result<()> {
    if buf.len() < needed {
        return Err(NetError::DeserializationFailed(format!(
            "not enough data to read {}: need {} bytes, {} remaining",
            what,
            needed,
            buf.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Scalars
// =============================================================================

macro_rules! impl_scalar {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.$put(*self);
                }
            }

            impl Decode for $ty {
                fn decode(buf: &mut &[u8]) -> Result<Self> {
                    ensure_remaining(buf, size_of::<$ty>(), stringify!($ty))?;
                    Ok(buf.$get())
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_ne, get_u16_ne;
    i16 => put_i16_ne, get_i16_ne;
    u32 => put_u32_ne, get_u32_ne;
    i32 => put_i32_ne, get_i32_ne;
    u64 => put_u64_ne, get_u64_ne;
    i64 => put_i64_ne, get_i64_ne;
    f32 => put_f32_ne, get_f32_ne;
    f64 => put_f64_ne, get_f64_ne;
}

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        match u8::decode(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(NetError::DeserializationFailed(format!(
                "invalid bool byte 0x{:02x}",
                other
            ))),
        }
    }
}

impl Encode for usize {
    fn encode(&self, buf: &mut Vec<u8>) {
        (*self as u64).encode(buf)
    }
}

impl Decode for usize {
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let value = u64::decode(buf)?;
        usize::try_from(value).map_err(|_| {
            NetError::DeserializationFailed(format!("usize value {} out of range", value))
        })
    }
}

impl Encode for isize {
    fn encode(&self, buf: &mut Vec<u8>) {
        (*self as i64).encode(buf)
    }
}

impl Decode for isize {
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let value = i64::decode(buf)?;
        isize::try_from(value).map_err(|_| {
            NetError::DeserializationFailed(format!("isize value {} out of range", value))
        })
    }
}

// =============================================================================
// Length-prefixed blocks
// =============================================================================

/// Append a length-prefixed block
pub(crate) fn put_block(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.put_u64_ne(bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Read a length-prefixed block, borrowing it from `buf`
pub(crate) fn take_block<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = u64::decode(buf)?;
    let len = usize::try_from(len).map_err(|_| {
        NetError::DeserializationFailed(format!("block length {} out of range", len))
    })?;
    ensure_remaining(buf, len, "length-prefixed block")?;

    let (block, rest) = buf.split_at(len);
    *buf = rest;
    Ok(block)
}

impl Encode for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        put_block(buf, self.as_bytes())
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf)
    }
}

impl Decode for String {
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let block = take_block(buf)?;
        String::from_utf8(block.to_vec())
            .map_err(|e| NetError::DeserializationFailed(format!("invalid UTF-8 string: {}", e)))
    }
}

impl Encode for [u8] {
    fn encode(&self, buf: &mut Vec<u8>) {
        put_block(buf, self)
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_slice().encode(buf)
    }
}

impl Decode for Vec<u8> {
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(take_block(buf)?.to_vec())
    }
}
