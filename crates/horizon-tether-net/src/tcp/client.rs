//! TCP client with signal-based event delivery.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use horizon_tether_core::logging::{span_names, targets};
use horizon_tether_core::{ConnectionId, PerfSpan, Signal};
use parking_lot::{Mutex, RwLock};

use super::config::TcpClientConfig;
use super::connector::Connector;
use super::event::{EventReceiver, InboundEvent, Subscribers};
use super::poller::{self, ReadOutcome};
use super::state::TcpConnectionState;
use super::stats::{ConnectionStats, StatsCounters};
use crate::Result;
use crate::error::TcpError;

/// The connected socket and the endpoint it belongs to.
#[derive(Debug, Default)]
struct Link {
    stream: Option<TcpStream>,
    host: String,
    port: u16,
    peer: Option<SocketAddr>,
}

impl Link {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A managed TCP client with signal-based event delivery.
///
/// The client owns at most one outbound connection. It connects with a
/// bounded number of non-blocking attempts, reads without blocking when the
/// host polls it, and can reconnect on its own after the server closes the
/// connection.
///
/// All operations are serialized by an internal lock, so the client can be
/// shared across threads behind the `Arc` returned by [`new`](Self::new).
/// [`connect_to`](Self::connect_to) blocks its caller for the whole retry
/// loop; hosts that must stay responsive use
/// [`spawn_connect`](Self::spawn_connect) or a [`PollDriver`](super::PollDriver).
///
/// # Signals
///
/// - [`data_received`](Self::data_received): Emitted by [`tick`](Self::tick) when bytes arrive
/// - [`server_disconnected`](Self::server_disconnected): Emitted when the server closes the connection
///
/// # Example
///
/// ```no_run
/// use horizon_tether_net::tcp::{TcpClient, TcpClientConfig};
///
/// let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 7000).max_reconnect_attempts(5));
///
/// client.data_received.connect(|data| println!("Received {} bytes", data.len()));
/// client.server_disconnected.connect(|(host, port)| println!("{host}:{port} went away"));
///
/// client.connect()?;
/// client.send(b"Hello, Server!")?;
///
/// loop {
///     client.tick()?;
///     std::thread::sleep(std::time::Duration::from_millis(16));
/// }
/// # Ok::<(), horizon_tether_net::TcpError>(())
/// ```
pub struct TcpClient {
    config: RwLock<TcpClientConfig>,
    link: Mutex<Link>,
    state: Mutex<TcpConnectionState>,
    reconnect_hook: Mutex<Option<ConnectionId>>,
    subscribers: Subscribers,
    stats: StatsCounters,
    this: Weak<TcpClient>,

    /// Signal emitted with the bytes delivered by a tick.
    pub data_received: Signal<Vec<u8>>,
    /// Signal emitted with the host and port when the server closes the connection.
    pub server_disconnected: Signal<(String, u16)>,
}

impl TcpClient {
    /// Create a new, disconnected TCP client with the given configuration.
    pub fn new(config: TcpClientConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            link: Mutex::new(Link {
                host: config.host.clone(),
                port: config.port,
                ..Link::default()
            }),
            config: RwLock::new(config),
            state: Mutex::new(TcpConnectionState::Disconnected),
            reconnect_hook: Mutex::new(None),
            subscribers: Subscribers::default(),
            stats: StatsCounters::default(),
            this: this.clone(),
            data_received: Signal::new(),
            server_disconnected: Signal::new(),
        })
    }

    /// Get the current connection state.
    pub fn state(&self) -> TcpConnectionState {
        *self.state.lock()
    }

    /// Check if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == TcpConnectionState::Connected
    }

    /// Connect to the configured host and port.
    pub fn connect(&self) -> Result<()> {
        let (host, port) = {
            let config = self.config.read();
            (config.host.clone(), config.port)
        };
        self.connect_to(&host, port)
    }

    /// Connect to `host:port`, retrying up to the configured attempt budget.
    ///
    /// Rejected with [`TcpError::AlreadyConnected`] (and no side effect) while
    /// a connection is established. Otherwise the target is validated and
    /// stored in the configuration (a rejected target leaves the configuration
    /// untouched), any stale socket is released and attempts run until one
    /// succeeds or the budget is spent, in which case the client stays
    /// disconnected and [`TcpError::ConnectFailed`] is returned.
    pub fn connect_to(&self, host: &str, port: u16) -> Result<()> {
        let _span = PerfSpan::new(span_names::CONNECT);
        let mut link = self.link.lock();

        if self.is_connected() {
            let address = link.address();
            tracing::warn!(target: targets::CONNECT, %address, "Already connected to the server");
            return Err(TcpError::AlreadyConnected { address });
        }

        self.release(&mut link);
        let mut config = self.config.read().clone();
        config.host = host.to_string();
        config.port = port;
        self.stats.record_connect_call();
        config.validate()?;
        *self.config.write() = config.clone();

        let connector = Connector::prepare(&config)?;
        self.set_state(TcpConnectionState::Connecting);

        match connector.run(|_| self.stats.record_attempt()) {
            Ok(established) => {
                tracing::info!(
                    target: targets::CONNECT,
                    address = %config.address(),
                    peer = %established.peer,
                    attempt = established.attempts,
                    "Connected to server"
                );
                link.stream = Some(established.stream);
                link.host = config.host;
                link.port = config.port;
                link.peer = Some(established.peer);
                self.set_state(TcpConnectionState::Connected);
                self.stats.record_established();
                drop(link);

                self.sync_reconnect_hook(config.auto_reconnect);
                Ok(())
            }
            Err(err) => {
                self.set_state(TcpConnectionState::Disconnected);
                tracing::error!(target: targets::CONNECT, error = %err, "Giving up on connection");
                Err(err)
            }
        }
    }

    /// Run [`connect`](Self::connect) on a background thread.
    pub fn spawn_connect(self: &Arc<Self>) -> io::Result<JoinHandle<Result<()>>> {
        let client = Arc::clone(self);
        std::thread::Builder::new()
            .name("horizon-tether-connect".into())
            .spawn(move || client.connect())
    }

    /// Send data to the server.
    ///
    /// The bytes are handed to the kernel without blocking. If the write
    /// fails, or the kernel stops accepting bytes before all of them were
    /// written, [`TcpError::Send`] reports how many went out; nothing is
    /// retried and the connection state is left alone.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let link = self.link.lock();
        let Some(mut stream) = link.stream.as_ref() else {
            tracing::warn!(target: targets::TCP, "Not connected to server");
            return Err(TcpError::NotConnected);
        };

        let mut written = 0;
        while written < data.len() {
            match stream.write(&data[written..]) {
                Ok(0) => {
                    return Err(self.send_failed(written, io::ErrorKind::WriteZero.into()));
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(self.send_failed(written, err)),
            }
        }

        self.stats.record_sent(written);
        Ok(())
    }

    fn send_failed(&self, written: usize, source: io::Error) -> TcpError {
        self.stats.record_sent(written);
        tracing::error!(target: targets::TCP, written, error = %source, "Failed to send data");
        TcpError::send(written, source)
    }

    /// Read at most `max_bytes` that are already available, without blocking.
    ///
    /// Returns an empty buffer when disconnected, when nothing has arrived
    /// yet, or when the server has closed the connection. In the last case
    /// the client releases its socket, becomes
    /// [`Disconnected`](TcpConnectionState::Disconnected) and emits
    /// [`server_disconnected`](Self::server_disconnected) exactly once.
    ///
    /// Other read failures are returned as [`TcpError::Receive`] and leave
    /// the connection in place, unless
    /// [`strict_receive_errors`](TcpClientConfig::strict_receive_errors) is
    /// set, in which case they are handled like a server close.
    pub fn poll(&self, max_bytes: u32) -> Result<Vec<u8>> {
        let (host, port) = {
            let mut link = self.link.lock();
            let Some(stream) = link.stream.as_ref() else {
                return Ok(Vec::new());
            };
            if max_bytes == 0 {
                return Ok(Vec::new());
            }

            match poller::read_available(stream, max_bytes as usize) {
                ReadOutcome::Data(bytes) => {
                    self.stats.record_received(bytes.len());
                    tracing::trace!(target: targets::POLL, len = bytes.len(), "received data");
                    return Ok(bytes);
                }
                ReadOutcome::Empty => return Ok(Vec::new()),
                ReadOutcome::Closed => {
                    tracing::info!(target: targets::POLL, address = %link.address(), "Connection closed by server");
                }
                ReadOutcome::Failed(err) => {
                    if !self.config.read().strict_receive_errors {
                        tracing::warn!(target: targets::POLL, error = %err, "Failed to receive data from server");
                        return Err(TcpError::Receive(err));
                    }
                    tracing::warn!(
                        target: targets::POLL,
                        error = %err,
                        "Failed to receive data from server, dropping connection"
                    );
                }
            }

            self.release(&mut link);
            self.stats.record_remote_disconnect();
            (link.host.clone(), link.port)
        };

        self.dispatch(InboundEvent::RemoteDisconnected { host, port });
        Ok(Vec::new())
    }

    /// One host scheduling step: poll with the configured receive buffer size
    /// and emit [`data_received`](Self::data_received) when bytes arrived.
    ///
    /// Returns the number of bytes delivered. With auto-reconnect enabled,
    /// the tick that observes a server close also runs the reconnect.
    pub fn tick(&self) -> Result<usize> {
        let max_bytes = self.config.read().receive_buffer_size;
        let data = self.poll(max_bytes)?;
        let len = data.len();
        if len > 0 {
            self.dispatch(InboundEvent::DataReceived(data));
        }
        Ok(len)
    }

    /// Close the connection.
    ///
    /// Does nothing when no socket is held, so it is always safe to call,
    /// including from a signal handler.
    pub fn close(&self) {
        let mut link = self.link.lock();
        if self.release(&mut link) {
            tracing::info!(target: targets::TCP, address = %link.address(), "Connection closed by client");
        }
    }

    /// Subscribe to a queue of [`InboundEvent`]s that the caller drains.
    pub fn subscribe(&self) -> EventReceiver {
        self.subscribers.subscribe()
    }

    /// Get a snapshot of the lifetime counters.
    pub fn stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    /// Get a copy of the current configuration.
    pub fn config(&self) -> TcpClientConfig {
        self.config.read().clone()
    }

    /// Get the host this client connects to.
    pub fn host(&self) -> String {
        self.config.read().host.clone()
    }

    /// Get the port this client connects to.
    pub fn port(&self) -> u16 {
        self.config.read().port
    }

    /// Get the full address (host:port) this client connects to.
    pub fn address(&self) -> String {
        self.config.read().address()
    }

    /// Get the resolved address of the server while connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.lock().peer
    }

    /// Whether the auto-reconnect hook is currently registered.
    pub fn has_reconnect_hook(&self) -> bool {
        self.reconnect_hook
            .lock()
            .is_some_and(|id| self.server_disconnected.is_connected(id))
    }

    /// Replace the whole configuration. Only allowed while disconnected.
    pub fn set_config(&self, config: TcpClientConfig) -> Result<()> {
        config.validate_options()?;
        self.update_config(|current| *current = config)
    }

    /// Enable or disable auto-reconnect. Only allowed while disconnected.
    pub fn set_auto_reconnect(&self, enabled: bool) -> Result<()> {
        self.update_config(|config| config.auto_reconnect = enabled)
    }

    /// Set the number of connect attempts. Only allowed while disconnected.
    pub fn set_max_reconnect_attempts(&self, attempts: u32) -> Result<()> {
        self.update_config(|config| config.max_reconnect_attempts = attempts)
    }

    /// Set the receive buffer size. Only allowed while disconnected.
    pub fn set_receive_buffer_size(&self, size: u32) -> Result<()> {
        if size == 0 {
            return Err(TcpError::invalid_config(
                "receive_buffer_size must be positive",
            ));
        }
        self.update_config(|config| config.receive_buffer_size = size)
    }

    /// Set the wait between connect attempts. Only allowed while disconnected.
    pub fn set_retry_interval(&self, interval: Duration) -> Result<()> {
        self.update_config(|config| config.retry_interval = interval)
    }

    fn update_config(&self, apply: impl FnOnce(&mut TcpClientConfig)) -> Result<()> {
        let _link = self.link.lock();
        let state = self.state();
        if state != TcpConnectionState::Disconnected {
            return Err(TcpError::ConfigLocked { state });
        }

        let auto_reconnect = {
            let mut config = self.config.write();
            apply(&mut config);
            config.auto_reconnect
        };
        tracing::debug!(target: targets::TCP, "configuration updated");

        // Enabling takes effect on the next established connection.
        if !auto_reconnect {
            self.sync_reconnect_hook(false);
        }
        Ok(())
    }

    /// Register or remove the slot that reconnects after a server close.
    fn sync_reconnect_hook(&self, enabled: bool) {
        let mut hook = self.reconnect_hook.lock();
        if let Some(id) = *hook
            && !self.server_disconnected.is_connected(id)
        {
            *hook = None;
        }

        match (*hook, enabled) {
            (None, true) => {
                let this = self.this.clone();
                let id = self.server_disconnected.connect(move |(host, port)| {
                    let Some(client) = this.upgrade() else {
                        return;
                    };
                    tracing::info!(target: targets::CONNECT, %host, port, "Reconnecting to server");
                    if let Err(err) = client.connect_to(host, *port) {
                        tracing::warn!(target: targets::CONNECT, error = %err, "Automatic reconnect failed");
                    }
                });
                *hook = Some(id);
            }
            (Some(id), false) => {
                self.server_disconnected.disconnect(id);
                *hook = None;
            }
            _ => {}
        }
    }

    /// Deliver an event to subscriber queues, then to the matching signal.
    fn dispatch(&self, event: InboundEvent) {
        self.subscribers.publish(&event);
        match event {
            InboundEvent::DataReceived(data) => {
                self.data_received.emit(data);
            }
            InboundEvent::RemoteDisconnected { host, port } => {
                self.server_disconnected.emit((host, port));
            }
        }
    }

    /// Drop the socket if one is held. Returns whether one was.
    fn release(&self, link: &mut Link) -> bool {
        link.peer = None;
        let released = link.stream.take().is_some();
        self.set_state(TcpConnectionState::Disconnected);
        released
    }

    fn set_state(&self, state: TcpConnectionState) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::debug!(target: targets::TCP, from = %*current, to = %state, "state changed");
            *current = state;
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        let link = self.link.get_mut();
        if link.stream.take().is_some() {
            tracing::debug!(target: targets::TCP, address = %link.address(), "closing connection on drop");
        }
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("address", &self.address())
            .field("state", &self.state())
            .finish()
    }
}
