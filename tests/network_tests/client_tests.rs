//! Tests for Client
//!
//! These tests verify:
//! - Usage errors (not connected, already connected)
//! - Setup failures (unresolvable host, refused connection)
//! - Send ordering and dispatch against a raw TCP peer
//! - Malformed frame accounting
//! - Teardown and reconnect

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use msgnet::protocol::{encode_frame, read_frame};
use msgnet::{Client, Config, Message, NetError};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder().poll_interval_ms(5).build()
}

fn raw_peer() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn connected_client() -> (Client, TcpStream) {
    let (listener, port) = raw_peer();
    let mut client = Client::with_config(test_config());
    client.connect("127.0.0.1", port).unwrap();

    let (peer, _) = listener.accept().unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    (client, peer)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn text_message(msg_type: i32, text: &str) -> Message {
    let mut message = Message::new(msg_type);
    message.push(text);
    message
}

// =============================================================================
// Usage Error Tests
// =============================================================================

#[test]
fn test_send_when_not_connected() {
    let client = Client::new();
    let err = client.send(Message::new(1)).unwrap_err();
    assert!(matches!(err, NetError::NotConnected));
}

#[test]
fn test_update_when_not_connected() {
    let client = Client::new();
    assert!(matches!(client.update(), Err(NetError::NotConnected)));
}

#[test]
fn test_connect_twice_fails() {
    let (mut client, _peer) = connected_client();
    let port = client.peer_addr().unwrap().port();

    let err = client.connect("127.0.0.1", port).unwrap_err();
    assert!(matches!(err, NetError::AlreadyConnected));
    assert!(client.is_connected());
}

#[test]
fn test_disconnect_without_connection_is_noop() {
    let mut client = Client::new();
    client.disconnect();
    client.disconnect();
    assert!(!client.is_connected());
}

// =============================================================================
// Setup Failure Tests
// =============================================================================

#[test]
fn test_connect_refused() {
    let (listener, port) = raw_peer();
    drop(listener);

    let mut client = Client::with_config(test_config());
    let err = client.connect("127.0.0.1", port).unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed(_)));
    assert!(!client.is_connected());
}

#[test]
fn test_connect_unresolvable_host() {
    let mut client = Client::with_config(test_config());
    let err = client.connect("host.invalid", 4242).unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed(_)));
}

// =============================================================================
// Messaging Tests
// =============================================================================

#[test]
fn test_send_preserves_order_on_the_wire() {
    let (client, mut peer) = connected_client();

    for text in ["A", "B", "C"] {
        client.send(text_message(1, text)).unwrap();
    }

    for expected in ["A", "B", "C"] {
        let mut message = read_frame(&mut peer, 1024).unwrap();
        assert_eq!(message.msg_type(), 1);
        assert_eq!(message.pop::<String>().unwrap(), expected);
    }
    assert_eq!(client.stats().frames_sent, 3);
}

#[test]
fn test_update_dispatches_in_arrival_order() {
    let (client, mut peer) = connected_client();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.define_action(2, move |mut message| {
        sink.lock().unwrap().push(message.pop::<String>().unwrap());
    });

    for text in ["first", "second", "third"] {
        peer.write_all(&encode_frame(&text_message(2, text))).unwrap();
    }

    assert!(wait_until(Duration::from_secs(2), || {
        client.update().unwrap();
        seen.lock().unwrap().len() == 3
    }));
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn test_unhandled_types_are_discarded() {
    let (client, mut peer) = connected_client();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    client.define_action(1, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    peer.write_all(&encode_frame(&Message::new(99))).unwrap();
    peer.write_all(&encode_frame(&Message::new(1))).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        client.update().unwrap();
        hits.load(Ordering::SeqCst) == 1
    }));
    assert!(wait_until(Duration::from_millis(50), || client.stats().frames_received == 2));
    assert_eq!(client.update().unwrap(), 0);
}

#[test]
fn test_malformed_frame_is_counted_and_skipped() {
    let (listener, port) = raw_peer();
    let mut client = Client::with_config(test_config());

    let reported = Arc::new(AtomicUsize::new(0));
    let hook_counter = Arc::clone(&reported);
    client.on_framing_error(move |err| {
        assert!(matches!(err, NetError::DeserializationFailed(_)));
        hook_counter.fetch_add(1, Ordering::SeqCst);
    });

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    client.define_action(3, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect("127.0.0.1", port).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    // Two-byte body cannot hold a message type
    peer.write_all(&2u64.to_ne_bytes()).unwrap();
    peer.write_all(&[0, 0]).unwrap();
    peer.write_all(&encode_frame(&Message::new(3))).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        client.update().unwrap();
        hits.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(client.stats().framing_errors, 1);
    assert_eq!(reported.load(Ordering::SeqCst), 1);
    assert!(client.is_connected());
}

// =============================================================================
// Teardown Tests
// =============================================================================

#[test]
fn test_peer_close_marks_client_disconnected() {
    let (client, peer) = connected_client();
    drop(peer);

    assert!(wait_until(Duration::from_secs(2), || !client.is_connected()));
    assert!(matches!(
        client.send(Message::new(1)),
        Err(NetError::NotConnected)
    ));
    assert!(matches!(client.update(), Err(NetError::NotConnected)));
}

#[test]
fn test_disconnect_completes_promptly() {
    let (mut client, _peer) = connected_client();

    let started = Instant::now();
    client.disconnect();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!client.is_connected());
    assert!(matches!(
        client.send(Message::new(1)),
        Err(NetError::NotConnected)
    ));
}

#[test]
fn test_disconnect_during_stalled_frame_is_prompt() {
    let (mut client, mut peer) = connected_client();

    // Header announces 64 bytes but only 2 arrive
    peer.write_all(&64u64.to_ne_bytes()).unwrap();
    peer.write_all(&[1, 2]).unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    client.disconnect();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!client.is_connected());
}

#[test]
fn test_empty_frame_from_peer_disconnects() {
    let (client, mut peer) = connected_client();
    peer.write_all(&0u64.to_ne_bytes()).unwrap();

    assert!(wait_until(Duration::from_secs(2), || !client.is_connected()));
    assert_eq!(client.stats().framing_errors, 0);
    assert!(matches!(client.update(), Err(NetError::NotConnected)));
}

#[test]
fn test_disconnect_closes_socket() {
    let (mut client, mut peer) = connected_client();
    client.disconnect();

    let err = read_frame(&mut peer, 1024).unwrap_err();
    assert!(err.is_disconnect());
}

#[test]
fn test_reconnect_keeps_actions() {
    let (listener, port) = raw_peer();
    let mut client = Client::with_config(test_config());

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    client.define_action(4, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect("127.0.0.1", port).unwrap();
    let (first, _) = listener.accept().unwrap();
    client.disconnect();
    drop(first);

    client.connect("127.0.0.1", port).unwrap();
    let (mut second, _) = listener.accept().unwrap();
    second.write_all(&encode_frame(&Message::new(4))).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        client.update().unwrap();
        hits.load(Ordering::SeqCst) == 1
    }));
}

#[test]
fn test_reconnect_after_peer_close() {
    let (listener, port) = raw_peer();
    let mut client = Client::with_config(test_config());

    client.connect("127.0.0.1", port).unwrap();
    let (first, _) = listener.accept().unwrap();
    drop(first);
    assert!(wait_until(Duration::from_secs(2), || !client.is_connected()));

    client.connect("127.0.0.1", port).unwrap();
    let (_second, _) = listener.accept().unwrap();
    assert!(client.is_connected());
}
