//! # msgnet
//!
//! A minimal message-oriented TCP transport with:
//! - Typed messages built from sequential typed appends
//! - Length-prefixed binary framing
//! - Background I/O threads bridged to the application by queues
//! - Per-type action dispatch driven by `update()`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Thread                         │
//! │        send / send_to*  (enqueue)    update (dispatch)       │
//! └───────────────┬──────────────────────────────▲──────────────┘
//!                 │ outbound queue               │ inbound queue
//! ┌───────────────▼──────────────────────────────┴──────────────┐
//! │                      I/O Threads                             │
//! │     Client: one I/O loop   Server: acceptor + rx/tx per peer │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Framer    │          │   Message   │
//!   │ (len + body)│          │   (codec)   │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use msgnet::{Client, Message, Server};
//!
//! # fn main() -> msgnet::Result<()> {
//! let mut server = Server::new();
//! server.define_action(1, |client_id, mut message| {
//!     let value: i32 = message.pop().unwrap_or_default();
//!     println!("client {} sent {}", client_id, value);
//! });
//! server.start(4242)?;
//!
//! let mut client = Client::new();
//! client.connect("127.0.0.1", 4242)?;
//!
//! let mut message = Message::new(1);
//! message.push(7i32).push("net");
//! client.send(message)?;
//!
//! server.update()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod message;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{NetError, Result};
pub use config::Config;
pub use message::{Decode, Encode, Message, MessageType};
pub use network::{Client, ClientId, Server, StatsSnapshot};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of msgnet
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
