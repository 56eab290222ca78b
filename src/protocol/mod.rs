//! Protocol Module
//!
//! Defines the wire protocol shared by client and server.
//!
//! ## Protocol Format
//!
//! One frame per message over a TCP byte stream:
//! ```text
//! offset 0:  u64 frame_length   (host byte order)
//! offset 8:  i32 message_type   (host byte order)
//! offset 12: payload            (frame_length - 4 bytes)
//! ```
//!
//! There is no checksum and no version field. Both peers must share a
//! byte order.

mod framer;

pub use framer::{
    decode_frame, encode_frame, read_frame, read_frame_body, write_frame, FRAME_HEADER_SIZE,
};
