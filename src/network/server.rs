//! TCP Server
//!
//! Accepts connections and runs two threads per client.
//!
//! ## Threads
//! - **Acceptor**: polls the listener, assigns a [`ClientId`], registers the
//!   client and spawns its reader and writer.
//! - **Reader** (one per client): reads frames into the shared inbound
//!   queue, tagged with the client's id.
//! - **Writer** (one per client): drains that client's outbound channel.
//!
//! A client leaves the table when its reader sees the peer go away, when its
//! writer fails, or when the server stops. Its pending outbound messages are
//! discarded with it.

use std::collections::{BTreeMap, VecDeque};
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::message::{Message, MessageType};

use super::actions::{ActionRegistry, ServerAction};
use super::connection::{log_connection_end, Connection, Received};
use super::stats::{StatsSnapshot, TransportStats};

/// Server-assigned connection identifier, starting at 1 and never reused
pub type ClientId = u64;

/// Hook told about every frame the server drops as malformed
pub type ServerFramingHook = dyn Fn(ClientId, &NetError) + Send + Sync;

/// Message server accepting many clients
pub struct Server {
    config: Config,

    actions: ActionRegistry<ServerAction>,

    stats: Arc<TransportStats>,

    /// Outlives individual runs so ids stay unique across restarts
    next_client_id: Arc<AtomicU64>,

    framing_hook: Option<Arc<ServerFramingHook>>,

    /// Present while running
    runtime: Option<Runtime>,
}

struct Runtime {
    shared: Arc<ServerShared>,
    acceptor: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

/// A live client as seen by the application thread
struct ClientEntry {
    outbound: Sender<Message>,

    /// Used to unblock the client's threads on removal
    control: TcpStream,

    peer_addr: String,
}

/// State shared by the server handle and all of its threads
struct ServerShared {
    config: Config,
    stop: AtomicBool,
    next_client_id: Arc<AtomicU64>,
    clients: Mutex<BTreeMap<ClientId, ClientEntry>>,
    inbound: Mutex<VecDeque<(ClientId, Message)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<TransportStats>,
    framing_hook: Option<Arc<ServerFramingHook>>,
}

impl Server {
    /// Create a server with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            actions: ActionRegistry::new(),
            stats: Arc::new(TransportStats::default()),
            next_client_id: Arc::new(AtomicU64::new(1)),
            framing_hook: None,
            runtime: None,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind `bind_host:port`, listen, and start accepting clients
    ///
    /// Port 0 picks an ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.runtime.is_some() {
            return Err(NetError::AlreadyStarted);
        }

        let host = self.config.bind_host.as_str();

        // std sets SO_REUSEADDR on Unix listeners before binding
        let listener = TcpListener::bind((host, port)).map_err(|e| {
            NetError::StartFailed(format!("failed to bind {}:{}: {}", host, port, e))
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| NetError::StartFailed(format!("failed to configure listener: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetError::StartFailed(format!("failed to read local address: {}", e)))?;

        let shared = Arc::new(ServerShared {
            config: self.config.clone(),
            stop: AtomicBool::new(false),
            next_client_id: Arc::clone(&self.next_client_id),
            clients: Mutex::new(BTreeMap::new()),
            inbound: Mutex::new(VecDeque::new()),
            workers: Mutex::new(Vec::new()),
            stats: Arc::clone(&self.stats),
            framing_hook: self.framing_hook.clone(),
        });

        let acceptor = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("msgnet-acceptor".to_string())
                .spawn(move || shared.run_acceptor(listener))
                .map_err(|e| NetError::StartFailed(format!("failed to spawn acceptor: {}", e)))?
        };

        tracing::info!("Server listening on {}", local_addr);

        self.runtime = Some(Runtime {
            shared,
            acceptor: Some(acceptor),
            local_addr,
        });
        Ok(())
    }

    /// Stop accepting, disconnect every client, and join all threads
    ///
    /// Queued messages in both directions are discarded. Does nothing if
    /// the server is not running.
    pub fn stop(&mut self) {
        let Some(mut runtime) = self.runtime.take() else {
            return;
        };
        let shared = &runtime.shared;

        shared.stop.store(true, Ordering::Release);

        if let Some(acceptor) = runtime.acceptor.take() {
            if acceptor.join().is_err() {
                tracing::warn!("Acceptor thread panicked");
            }
        }

        // Dropping the entries closes every outbound channel
        let clients = std::mem::take(&mut *shared.clients.lock());
        for (id, entry) in &clients {
            tracing::debug!("Closing client {} ({})", id, entry.peer_addr);
            let _ = entry.control.shutdown(Shutdown::Both);
        }
        drop(clients);

        let workers = std::mem::take(&mut *shared.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("Client thread panicked");
            }
        }

        shared.inbound.lock().clear();
        tracing::info!("Server on {} stopped", runtime.local_addr);
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime.as_ref().map(|r| r.local_addr)
    }

    fn shared(&self) -> Result<&Arc<ServerShared>> {
        self.runtime
            .as_ref()
            .map(|r| &r.shared)
            .ok_or(NetError::NotStarted)
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Ids of the currently connected clients, ascending
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.shared()
            .map(|s| s.clients.lock().keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn client_count(&self) -> usize {
        self.shared().map(|s| s.clients.lock().len()).unwrap_or(0)
    }

    /// Close one client's connection
    pub fn disconnect_client(&self, client_id: ClientId) -> Result<()> {
        let shared = self.shared()?;
        if shared.remove_client(client_id) {
            Ok(())
        } else {
            Err(NetError::UnknownClient(client_id))
        }
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Register the action for `msg_type`, replacing any previous one
    pub fn define_action<F>(&self, msg_type: MessageType, action: F)
    where
        F: Fn(ClientId, Message) + Send + Sync + 'static,
    {
        self.actions.define(msg_type, Arc::new(action));
    }

    /// Install a hook for frames dropped as malformed
    ///
    /// Takes effect from the next `start`.
    pub fn on_framing_error<F>(&mut self, hook: F)
    where
        F: Fn(ClientId, &NetError) + Send + Sync + 'static,
    {
        self.framing_hook = Some(Arc::new(hook));
    }

    /// Queue a message for one client
    pub fn send_to(&self, message: Message, client_id: ClientId) -> Result<()> {
        self.shared()?.enqueue(client_id, message)
    }

    /// Queue a message for each listed client
    ///
    /// Every target is attempted. If any fails the call returns
    /// `BatchSendingFailed` listing them; the others keep their copy.
    pub fn send_to_array(&self, message: &Message, client_ids: &[ClientId]) -> Result<()> {
        let shared = self.shared()?;

        let failed: Vec<ClientId> = client_ids
            .iter()
            .copied()
            .filter(|&id| shared.enqueue(id, message.clone()).is_err())
            .collect();

        batch_result(failed)
    }

    /// Queue a message for every connected client
    pub fn send_to_all(&self, message: &Message) -> Result<()> {
        let shared = self.shared()?;

        let failed: Vec<ClientId> = shared
            .clients
            .lock()
            .iter()
            .filter(|(_, entry)| entry.outbound.send(message.clone()).is_err())
            .map(|(&id, _)| id)
            .collect();

        batch_result(failed)
    }

    /// Dispatch every message received since the last call
    ///
    /// Returns how many messages had an action.
    pub fn update(&self) -> Result<usize> {
        let shared = self.shared()?;

        let pending = std::mem::take(&mut *shared.inbound.lock());
        let actions = self.actions.snapshot();

        let mut dispatched = 0;
        for (client_id, message) in pending {
            match actions.get(&message.msg_type()) {
                Some(action) => {
                    action(client_id, message);
                    dispatched += 1;
                }
                None => tracing::trace!(
                    "No action for message type {} from client {}, dropping",
                    message.msg_type(),
                    client_id
                ),
            }
        }

        Ok(dispatched)
    }

    /// Counters accumulated across every run of this server
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn batch_result(failed: Vec<ClientId>) -> Result<()> {
    if failed.is_empty() {
        Ok(())
    } else {
        tracing::debug!("Batch send failed for {} client(s)", failed.len());
        Err(NetError::BatchSendingFailed { failed })
    }
}

// =============================================================================
// Server threads
// =============================================================================

impl ServerShared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn enqueue(&self, client_id: ClientId, message: Message) -> Result<()> {
        let clients = self.clients.lock();
        let entry = clients
            .get(&client_id)
            .ok_or(NetError::UnknownClient(client_id))?;
        entry
            .outbound
            .send(message)
            .map_err(|_| NetError::UnknownClient(client_id))
    }

    /// Drop a client from the table and shut its socket down
    fn remove_client(&self, client_id: ClientId) -> bool {
        let removed = self.clients.lock().remove(&client_id);
        match removed {
            Some(entry) => {
                let _ = entry.control.shutdown(Shutdown::Both);
                tracing::debug!("Client {} ({}) removed", client_id, entry.peer_addr);
                true
            }
            None => false,
        }
    }

    fn run_acceptor(self: Arc<Self>, listener: TcpListener) {
        let poll_interval = self.config.poll_interval();

        while !self.stopping() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = Arc::clone(&self).register(stream, addr) {
                        tracing::warn!("Failed to register connection from {}: {}", addr, e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(poll_interval),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(poll_interval);
                }
            }
        }

        tracing::debug!("Acceptor stopped");
    }

    fn register(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        if self.clients.lock().len() >= self.config.max_clients {
            tracing::warn!(
                "Refusing connection from {}: client limit {} reached",
                addr,
                self.config.max_clients
            );
            return Ok(());
        }

        // Some platforms hand out accepted sockets in the listener's mode
        stream.set_nonblocking(false)?;
        let reader = Connection::new(stream, &self.config)?;
        let writer = reader.try_clone()?;
        let control = reader.shutdown_handle()?;

        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let (outbound_tx, outbound_rx) = unbounded();

        self.clients.lock().insert(
            client_id,
            ClientEntry {
                outbound: outbound_tx,
                control,
                peer_addr: addr.to_string(),
            },
        );
        self.stats.record_accepted();
        tracing::debug!("Accepted client {} from {}", client_id, addr);

        let spawned = self.spawn_client_threads(client_id, reader, writer, outbound_rx);
        if let Err(e) = spawned {
            self.remove_client(client_id);
            return Err(e);
        }
        Ok(())
    }

    fn spawn_client_threads(
        self: &Arc<Self>,
        client_id: ClientId,
        reader: Connection,
        writer: Connection,
        outbound: Receiver<Message>,
    ) -> Result<()> {
        let reader_handle = {
            let shared = Arc::clone(self);
            thread::Builder::new()
                .name(format!("msgnet-client-{}-rx", client_id))
                .spawn(move || shared.run_reader(client_id, reader))?
        };
        let writer_handle = {
            let shared = Arc::clone(self);
            thread::Builder::new()
                .name(format!("msgnet-client-{}-tx", client_id))
                .spawn(move || shared.run_writer(client_id, writer, outbound))?
        };

        let mut workers = self.workers.lock();
        workers.retain(|handle| !handle.is_finished());
        workers.push(reader_handle);
        workers.push(writer_handle);
        Ok(())
    }

    fn run_reader(self: Arc<Self>, client_id: ClientId, mut conn: Connection) {
        while !self.stopping() {
            match conn.receive() {
                Ok(Received::Idle) => {}
                Ok(Received::Message(message)) => {
                    tracing::trace!(
                        "Received message type {} ({} bytes) from client {}",
                        message.msg_type(),
                        message.len(),
                        client_id
                    );
                    self.stats.record_received();
                    self.inbound.lock().push_back((client_id, message));
                }
                Ok(Received::Malformed(e)) => {
                    self.stats.record_framing_error();
                    tracing::warn!("Dropping malformed frame from client {}: {}", client_id, e);
                    if let Some(hook) = &self.framing_hook {
                        hook(client_id, &e);
                    }
                }
                Err(e) => {
                    log_connection_end(conn.peer_addr(), &e);
                    break;
                }
            }
        }

        self.remove_client(client_id);
    }

    fn run_writer(
        self: Arc<Self>,
        client_id: ClientId,
        mut conn: Connection,
        outbound: Receiver<Message>,
    ) {
        let poll_interval = self.config.poll_interval();

        loop {
            match outbound.recv_timeout(poll_interval) {
                Ok(message) => {
                    if let Err(e) = conn.send(&message) {
                        log_connection_end(conn.peer_addr(), &e);
                        self.remove_client(client_id);
                        break;
                    }
                    self.stats.record_sent();
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stopping() {
                        break;
                    }
                }
                // Client was removed from the table
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
