//! Transport counters
//!
//! Lock-free counters updated by the I/O threads and read by the
//! application through [`StatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct TransportStats {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    framing_errors: AtomicU64,
    connections_accepted: AtomicU64,
}

impl TransportStats {
    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a client's or server's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames written to sockets
    pub frames_sent: u64,

    /// Well-formed frames queued for dispatch
    pub frames_received: u64,

    /// Complete frames dropped because their body did not decode
    pub framing_errors: u64,

    /// Connections accepted (server only)
    pub connections_accepted: u64,
}
