//! TCP Client
//!
//! Owns one outbound connection and a background I/O thread.
//!
//! ## Threads
//! - The application thread calls [`Client::send`] (enqueue only) and
//!   [`Client::update`] (drain inbound queue + dispatch).
//! - The I/O thread flushes the outbound queue, polls the socket, and
//!   fills the inbound queue. It exits on stop, write failure, or peer
//!   close; the client then reports `NotConnected`.

use std::collections::VecDeque;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::message::{Message, MessageType};

use super::actions::{ActionRegistry, ClientAction};
use super::connection::{log_connection_end, Connection, Received};
use super::stats::{StatsSnapshot, TransportStats};

/// Hook told about every frame the client drops as malformed
pub type ClientFramingHook = dyn Fn(&NetError) + Send + Sync;

/// Message client for a single remote endpoint
pub struct Client {
    config: Config,

    /// Survives reconnects
    actions: ActionRegistry<ClientAction>,

    stats: Arc<TransportStats>,

    framing_hook: Option<Arc<ClientFramingHook>>,

    /// Present from `connect` until `disconnect`, even if the I/O loop died
    session: Option<Session>,
}

/// State of one established connection
struct Session {
    shared: Arc<SessionShared>,
    outbound: Sender<Message>,
    worker: Option<JoinHandle<()>>,

    /// Unblocks the I/O thread from a stalled read or write
    control: TcpStream,

    peer_addr: SocketAddr,
}

/// State the I/O thread shares with the application thread
#[derive(Default)]
struct SessionShared {
    connected: AtomicBool,
    stop: AtomicBool,
    inbound: Mutex<VecDeque<Message>>,
}

impl Client {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            actions: ActionRegistry::new(),
            stats: Arc::new(TransportStats::default()),
            framing_hook: None,
            session: None,
        }
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Connect to `address:port`
    ///
    /// Every resolved address is tried in order; the first successful
    /// connect wins.
    pub fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        if self.is_connected() {
            return Err(NetError::AlreadyConnected);
        }

        // A previous session whose I/O loop died still needs joining
        self.disconnect();

        let candidates: Vec<SocketAddr> = (address, port)
            .to_socket_addrs()
            .map_err(|e| {
                NetError::ConnectionFailed(format!("failed to resolve address {}: {}", address, e))
            })?
            .collect();

        let stream = self.connect_any(&candidates).ok_or_else(|| {
            NetError::ConnectionFailed(format!(
                "failed to connect to server {}:{}",
                address, port
            ))
        })?;

        let peer_addr = stream
            .peer_addr()
            .map_err(|e| NetError::ConnectionFailed(e.to_string()))?;
        let conn = Connection::new(stream, &self.config)
            .map_err(|e| NetError::ConnectionFailed(e.to_string()))?;
        let control = conn
            .shutdown_handle()
            .map_err(|e| NetError::ConnectionFailed(e.to_string()))?;

        let shared = Arc::new(SessionShared::default());
        shared.connected.store(true, Ordering::Release);

        let (outbound_tx, outbound_rx) = unbounded();
        let worker = {
            let shared = Arc::clone(&shared);
            let stats = Arc::clone(&self.stats);
            let hook = self.framing_hook.clone();
            thread::Builder::new()
                .name("msgnet-client-io".to_string())
                .spawn(move || run_io_loop(conn, shared, outbound_rx, stats, hook))
                .map_err(|e| NetError::ConnectionFailed(format!("failed to spawn I/O thread: {}", e)))?
        };

        tracing::debug!("Connected to {}", peer_addr);

        self.session = Some(Session {
            shared,
            outbound: outbound_tx,
            worker: Some(worker),
            control,
            peer_addr,
        });
        Ok(())
    }

    fn connect_any(&self, candidates: &[SocketAddr]) -> Option<TcpStream> {
        let timeout = self.config.connect_timeout();
        candidates
            .iter()
            .find_map(|addr| match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    None
                }
            })
    }

    /// Stop the I/O thread and close the connection
    ///
    /// Queued messages in both directions are discarded. Does nothing if
    /// there is no connection.
    pub fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.shared.stop.store(true, Ordering::Release);
        session.shared.connected.store(false, Ordering::Release);
        let _ = session.control.shutdown(Shutdown::Both);

        if let Some(worker) = session.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Client I/O thread panicked");
            }
        }

        let dropped = session.shared.inbound.lock().len() + session.outbound.len();
        if dropped > 0 {
            tracing::debug!("Discarding {} queued message(s) on disconnect", dropped);
        }

        tracing::debug!("Disconnected from {}", session.peer_addr);
    }

    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.shared.connected.load(Ordering::Acquire))
    }

    /// Address of the connected server
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.live_session().ok().map(|s| s.peer_addr)
    }

    fn live_session(&self) -> Result<&Session> {
        match &self.session {
            Some(session) if session.shared.connected.load(Ordering::Acquire) => Ok(session),
            _ => Err(NetError::NotConnected),
        }
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Register the action for `msg_type`, replacing any previous one
    pub fn define_action<F>(&self, msg_type: MessageType, action: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.actions.define(msg_type, Arc::new(action));
    }

    /// Install a hook for frames dropped as malformed
    ///
    /// Takes effect from the next `connect`.
    pub fn on_framing_error<F>(&mut self, hook: F)
    where
        F: Fn(&NetError) + Send + Sync + 'static,
    {
        self.framing_hook = Some(Arc::new(hook));
    }

    /// Queue a message for the I/O thread
    ///
    /// Returns once queued; delivery is not confirmed.
    pub fn send(&self, message: Message) -> Result<()> {
        let session = self.live_session()?;
        session
            .outbound
            .send(message)
            .map_err(|_| NetError::NotConnected)
    }

    /// Dispatch every message received since the last call
    ///
    /// Messages are handed to their actions in arrival order. Messages
    /// without an action are dropped. Returns how many were dispatched.
    pub fn update(&self) -> Result<usize> {
        let session = self.live_session()?;

        let pending = std::mem::take(&mut *session.shared.inbound.lock());
        let actions = self.actions.snapshot();

        let mut dispatched = 0;
        for message in pending {
            match actions.get(&message.msg_type()) {
                Some(action) => {
                    action(message);
                    dispatched += 1;
                }
                None => tracing::trace!(
                    "No action for message type {}, dropping",
                    message.msg_type()
                ),
            }
        }

        Ok(dispatched)
    }

    /// Counters accumulated across all connections of this client
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// I/O thread
// =============================================================================

fn run_io_loop(
    mut conn: Connection,
    shared: Arc<SessionShared>,
    outbound: Receiver<Message>,
    stats: Arc<TransportStats>,
    hook: Option<Arc<ClientFramingHook>>,
) {
    tracing::debug!("Client I/O loop started for {}", conn.peer_addr());

    while !shared.stop.load(Ordering::Acquire) {
        if let Err(e) = flush_outbound(&mut conn, &outbound, &stats) {
            log_connection_end(conn.peer_addr(), &e);
            break;
        }

        match conn.receive() {
            Ok(Received::Idle) => {}
            Ok(Received::Message(message)) => {
                tracing::trace!(
                    "Received message type {} ({} bytes) from {}",
                    message.msg_type(),
                    message.len(),
                    conn.peer_addr()
                );
                stats.record_received();
                shared.inbound.lock().push_back(message);
            }
            Ok(Received::Malformed(e)) => {
                stats.record_framing_error();
                tracing::warn!("Dropping malformed frame from {}: {}", conn.peer_addr(), e);
                if let Some(hook) = &hook {
                    hook(&e);
                }
            }
            Err(e) => {
                log_connection_end(conn.peer_addr(), &e);
                break;
            }
        }
    }

    shared.connected.store(false, Ordering::Release);
    tracing::debug!("Client I/O loop stopped for {}", conn.peer_addr());
}

/// Write every queued message, oldest first
fn flush_outbound(
    conn: &mut Connection,
    outbound: &Receiver<Message>,
    stats: &TransportStats,
) -> Result<()> {
    for message in outbound.try_iter() {
        conn.send(&message)?;
        stats.record_sent();
    }
    Ok(())
}
