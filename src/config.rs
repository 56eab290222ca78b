//! Configuration for msgnet
//!
//! Centralized configuration with sensible defaults, shared by
//! [`Client`](crate::Client) and [`Server`](crate::Server).

use std::time::Duration;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Host the server listener binds to (the port is given to `start`)
    pub bind_host: String,

    /// Max concurrent client connections; further connections are refused
    pub max_clients: usize,

    // -------------------------------------------------------------------------
    // I/O Loop Configuration
    // -------------------------------------------------------------------------
    /// How long an I/O thread waits on a socket or queue before re-checking
    /// its stop flag (milliseconds)
    pub poll_interval_ms: u64,

    /// Upper bound on reading one frame once its first byte has arrived
    /// (milliseconds). A peer stalling mid-frame past this is dropped.
    pub frame_timeout_ms: u64,

    /// Per-address connect timeout used by the client (milliseconds)
    pub connect_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Largest accepted frame body in bytes; larger length headers are
    /// treated as malformed and close the connection
    pub max_frame_size: u64,

    /// Disable Nagle's algorithm on every stream
    pub nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            max_clients: 1024,
            poll_interval_ms: 10,
            frame_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            nodelay: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero timeout means "block forever" to the socket layer
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the host the server binds to
    pub fn bind_host(mut self, host: impl Into<String>) -> Self {
        self.config.bind_host = host.into();
        self
    }

    /// Set the maximum number of concurrent clients
    pub fn max_clients(mut self, count: usize) -> Self {
        self.config.max_clients = count;
        self
    }

    /// Set the I/O poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the per-frame read timeout (in milliseconds)
    pub fn frame_timeout_ms(mut self, ms: u64) -> Self {
        self.config.frame_timeout_ms = ms;
        self
    }

    /// Set the client connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the maximum frame body size (in bytes)
    pub fn max_frame_size(mut self, bytes: u64) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
