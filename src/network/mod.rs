//! Network Module
//!
//! TCP client and server built on the framed protocol.
//!
//! ## Architecture
//! - One I/O thread per client
//! - One acceptor thread per server, plus a reader and a writer per
//!   accepted connection
//! - I/O threads and the application thread meet only at queues
//! - `update()` dispatches queued messages to per-type actions

mod actions;
mod client;
mod connection;
mod server;
mod stats;

pub use actions::{ActionRegistry, ClientAction, ServerAction};
pub use client::{Client, ClientFramingHook};
pub use server::{ClientId, Server, ServerFramingHook};
pub use stats::StatsSnapshot;
