//! Connection Handler
//!
//! Socket plumbing shared by the client I/O loop and the server's
//! per-connection threads.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::message::Message;
use crate::protocol::{decode_frame, read_frame_body, write_frame};

/// Outcome of one receive attempt
#[derive(Debug)]
pub(crate) enum Received {
    /// Nothing arrived within the poll interval
    Idle,

    /// A complete, well-formed message
    Message(Message),

    /// A complete frame whose body could not be decoded
    Malformed(NetError),
}

/// One framed TCP connection
pub(crate) struct Connection {
    stream: TcpStream,

    /// Peer address for logging
    peer_addr: String,

    poll_interval: Duration,
    frame_timeout: Duration,
    max_frame_size: u64,
}

impl Connection {
    /// Wrap a connected stream, applying the configured socket options
    pub fn new(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(config.nodelay)?;
        stream.set_write_timeout(Some(config.frame_timeout()))?;

        Ok(Self {
            stream,
            peer_addr,
            poll_interval: config.poll_interval(),
            frame_timeout: config.frame_timeout(),
            max_frame_size: config.max_frame_size,
        })
    }

    /// Another handle to the same socket (used to split reading and writing)
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            peer_addr: self.peer_addr.clone(),
            poll_interval: self.poll_interval,
            frame_timeout: self.frame_timeout,
            max_frame_size: self.max_frame_size,
        })
    }

    /// A raw handle that can shut the socket down from another thread
    pub fn shutdown_handle(&self) -> Result<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    /// Wait up to one poll interval for readable data
    ///
    /// Returns `ConnectionClosed` if the peer has shut down its side.
    pub fn poll_readable(&self) -> Result<bool> {
        self.stream.set_read_timeout(Some(self.poll_interval))?;

        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            Ok(0) => Err(NetError::ConnectionClosed),
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll once and, if data is ready, read one whole frame
    ///
    /// Errors mean the connection is no longer usable. A frame that arrives
    /// intact but fails to decode is reported as [`Received::Malformed`] and
    /// leaves the stream aligned on the next frame.
    pub fn receive(&mut self) -> Result<Received> {
        if !self.poll_readable()? {
            return Ok(Received::Idle);
        }

        self.stream.set_read_timeout(Some(self.frame_timeout))?;
        let body = read_frame_body(&mut self.stream, self.max_frame_size)?;

        Ok(match decode_frame(&body) {
            Ok(message) => Received::Message(message),
            Err(e) => Received::Malformed(e),
        })
    }

    /// Write one message frame
    pub fn send(&mut self, message: &Message) -> Result<()> {
        write_frame(&mut self.stream, message)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Log why a connection loop ended
pub(crate) fn log_connection_end(peer_addr: &str, err: &NetError) {
    if err.is_disconnect() {
        tracing::debug!("Peer {} disconnected: {}", peer_addr, err);
    } else {
        tracing::warn!("Connection to {} failed: {}", peer_addr, err);
    }
}
