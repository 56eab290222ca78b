//! Framer Tests
//!
//! Tests for frame encoding and stream-based frame reading.

use std::io::Cursor;

use msgnet::message::{Message, TYPE_SIZE};
use msgnet::protocol::{
    decode_frame, encode_frame, read_frame, read_frame_body, write_frame, FRAME_HEADER_SIZE,
};
use msgnet::NetError;

const MAX: u64 = 1024 * 1024;

fn sample_message() -> Message {
    let mut message = Message::new(1);
    message.push(7i32).push("net");
    message
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_frame_layout() {
    let message = sample_message();
    let frame = encode_frame(&message);
    let body = message.serialize();

    assert_eq!(frame.len(), FRAME_HEADER_SIZE + body.len());
    assert_eq!(
        &frame[..FRAME_HEADER_SIZE],
        &(body.len() as u64).to_ne_bytes()
    );
    assert_eq!(
        &frame[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + TYPE_SIZE],
        &1i32.to_ne_bytes()
    );
    assert_eq!(&frame[FRAME_HEADER_SIZE..], body.as_slice());
}

#[test]
fn test_empty_message_frame_is_header_plus_type() {
    let frame = encode_frame(&Message::new(9));
    assert_eq!(frame.len(), FRAME_HEADER_SIZE + TYPE_SIZE);
    assert_eq!(&frame[..FRAME_HEADER_SIZE], &(TYPE_SIZE as u64).to_ne_bytes());
}

// =============================================================================
// Stream Tests
// =============================================================================

#[test]
fn test_write_then_read_frames_in_order() {
    let mut buf = Vec::new();
    for msg_type in [1, 2, 3] {
        let mut message = Message::new(msg_type);
        message.push(msg_type * 10);
        write_frame(&mut buf, &message).unwrap();
    }

    let mut cursor = Cursor::new(buf);
    for msg_type in [1, 2, 3] {
        let mut message = read_frame(&mut cursor, MAX).unwrap();
        assert_eq!(message.msg_type(), msg_type);
        assert_eq!(message.pop::<i32>().unwrap(), msg_type * 10);
    }
}

#[test]
fn test_read_values_survive_framing() {
    let mut cursor = Cursor::new(encode_frame(&sample_message()));
    let mut message = read_frame(&mut cursor, MAX).unwrap();

    assert_eq!(message.pop::<i32>().unwrap(), 7);
    assert_eq!(message.pop::<String>().unwrap(), "net");
}

#[test]
fn test_empty_stream_is_connection_closed() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let err = read_frame_body(&mut cursor, MAX).unwrap_err();
    assert!(matches!(err, NetError::ConnectionClosed));
}

#[test]
fn test_partial_header_is_connection_closed() {
    let mut cursor = Cursor::new(vec![4u8, 0, 0]);
    let err = read_frame_body(&mut cursor, MAX).unwrap_err();
    assert!(err.is_disconnect());
}

#[test]
fn test_short_body_is_disconnect() {
    let mut frame = encode_frame(&sample_message());
    frame.truncate(frame.len() - 2);

    let mut cursor = Cursor::new(frame);
    let err = read_frame_body(&mut cursor, MAX).unwrap_err();
    assert!(err.is_disconnect());
}

#[test]
fn test_oversized_frame_rejected_before_body() {
    let mut cursor = Cursor::new((MAX + 1).to_ne_bytes().to_vec());
    let err = read_frame_body(&mut cursor, MAX).unwrap_err();

    match err {
        NetError::FrameTooLarge { size, max } => {
            assert_eq!(size, MAX + 1);
            assert_eq!(max, MAX);
        }
        other => panic!("Expected FrameTooLarge, got {:?}", other),
    }
}

#[test]
fn test_body_shorter_than_type_is_malformed() {
    let mut data = 2u64.to_ne_bytes().to_vec();
    data.extend_from_slice(&[1, 2]);

    let mut cursor = Cursor::new(data);
    let body = read_frame_body(&mut cursor, MAX).unwrap();
    assert_eq!(body.len(), 2);
    assert!(matches!(
        decode_frame(&body),
        Err(NetError::DeserializationFailed(_))
    ));
}

#[test]
fn test_zero_length_frame_closes_connection() {
    let mut cursor = Cursor::new(0u64.to_ne_bytes().to_vec());
    let err = read_frame_body(&mut cursor, MAX).unwrap_err();
    assert!(matches!(err, NetError::ConnectionClosed));
    assert!(err.is_disconnect());
}
