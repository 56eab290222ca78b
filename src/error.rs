//! Error types for msgnet
//!
//! Provides a unified error type for all transport operations.

use std::io;

use thiserror::Error;

use crate::network::ClientId;

/// Result type alias using NetError
pub type Result<T> = std::result::Result<T, NetError>;

/// Unified error type for msgnet operations
#[derive(Debug, Error)]
pub enum NetError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },

    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    #[error("Client: already connected")]
    AlreadyConnected,

    #[error("Client: not connected")]
    NotConnected,

    #[error("Client: connection failed: {0}")]
    ConnectionFailed(String),

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("Server: already started")]
    AlreadyStarted,

    #[error("Server: not started")]
    NotStarted,

    #[error("Server: start failed: {0}")]
    StartFailed(String),

    #[error("Server: unknown client {0}")]
    UnknownClient(ClientId),

    #[error("Server: failed to send to {} client(s): {failed:?}", .failed.len())]
    BatchSendingFailed { failed: Vec<ClientId> },
}

impl NetError {
    /// Whether this error means the peer went away rather than misbehaved
    pub fn is_disconnect(&self) -> bool {
        match self {
            NetError::ConnectionClosed => true,
            NetError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
