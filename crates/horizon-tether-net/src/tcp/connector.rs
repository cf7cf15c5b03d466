//! Connection establishment: non-blocking connect with a bounded attempt budget.
//!
//! A connect call resolves the target, allocates a non-blocking socket and
//! then makes up to [`TcpClientConfig::attempt_budget`] attempts, one every
//! `retry_interval`. When the platform reports that a connect is in progress
//! the attempt watches the socket until the interval runs out, so the wait
//! between attempts doubles as the readiness window. A handshake that is still
//! pending at the end of the window counts as one failed attempt and the next
//! attempt keeps waiting on the same socket.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use horizon_tether_core::logging::targets;
use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};

use super::config::{TcpClientConfig, TcpSocketConfig};
use crate::error::{Result, TcpError};

/// How often an in-progress connect is re-checked inside the readiness window.
const SETTLE_STEP: Duration = Duration::from_millis(5);

/// Outcome of a single connect attempt.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    /// The handshake completed.
    Established,
    /// The handshake is still pending after the readiness window.
    InProgress,
    /// The attempt failed (refused, unreachable, timed out...).
    Failed(io::Error),
}

/// How the platform classified an error returned by `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    Pending,
    Established,
    Failed,
}

/// A connection that completed its handshake.
#[derive(Debug)]
pub(crate) struct Established {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub attempts: u32,
}

/// Drives the attempts of one connect call.
pub(crate) struct Connector<'a> {
    config: &'a TcpClientConfig,
    addr: SocketAddr,
    socket: Socket,
}

impl<'a> Connector<'a> {
    /// Resolve the target and allocate the first socket.
    ///
    /// Failures here abort the connect call without consuming attempts.
    pub(crate) fn prepare(config: &'a TcpClientConfig) -> Result<Self> {
        let addr = resolve(&config.host, config.port)?;
        let socket = open_socket(addr, &config.socket)?;
        Ok(Self {
            config,
            addr,
            socket,
        })
    }

    /// Make attempts until one succeeds or the budget is spent.
    ///
    /// `on_attempt` is called with the 1-based attempt number before each attempt.
    pub(crate) fn run(mut self, mut on_attempt: impl FnMut(u32)) -> Result<Established> {
        let budget = self.config.attempt_budget();
        let interval = self.config.retry_interval;
        let address = self.config.address();
        let mut last_error = None;
        let mut attempts = 0;

        while attempts < budget {
            attempts += 1;
            on_attempt(attempts);
            let started = Instant::now();

            match self.attempt(interval) {
                AttemptOutcome::Established => {
                    let stream: TcpStream = self.socket.into();
                    return Ok(Established {
                        stream,
                        peer: self.addr,
                        attempts,
                    });
                }
                AttemptOutcome::InProgress => {
                    tracing::debug!(
                        target: targets::CONNECT,
                        %address,
                        attempt = attempts,
                        "Connection in progress..."
                    );
                }
                AttemptOutcome::Failed(err) => {
                    tracing::warn!(
                        target: targets::CONNECT,
                        %address,
                        attempt = attempts,
                        error = %err,
                        "Failed to connect to the server"
                    );
                    last_error = Some(err);
                    if !self.config.auto_reconnect || attempts == budget {
                        break;
                    }
                    // A socket whose connect failed is not reusable on every platform.
                    self.socket = open_socket(self.addr, &self.config.socket)?;
                    std::thread::sleep(interval.saturating_sub(started.elapsed()));
                }
            }
        }

        Err(TcpError::ConnectFailed {
            address,
            attempts,
            source: last_error,
        })
    }

    fn attempt(&self, window: Duration) -> AttemptOutcome {
        match self.socket.connect(&SockAddr::from(self.addr)) {
            Ok(()) => AttemptOutcome::Established,
            Err(err) => match classify(&err) {
                Progress::Established => AttemptOutcome::Established,
                Progress::Pending => self.await_established(window),
                Progress::Failed => AttemptOutcome::Failed(err),
            },
        }
    }

    /// Watch an in-progress connect until it resolves or `window` elapses.
    fn await_established(&self, window: Duration) -> AttemptOutcome {
        let deadline = Instant::now() + window;
        loop {
            match self.socket.take_error() {
                Ok(Some(err)) | Err(err) => return AttemptOutcome::Failed(err),
                Ok(None) => {}
            }
            if self.socket.peer_addr().is_ok() {
                return AttemptOutcome::Established;
            }
            let now = Instant::now();
            if now >= deadline {
                return AttemptOutcome::InProgress;
            }
            std::thread::sleep(SETTLE_STEP.min(deadline - now));
        }
    }
}

/// Resolve `host:port`, preferring an IPv4 address when several are returned.
pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let address = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TcpError::AddressResolution {
            address: address.clone(),
            source,
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TcpError::AddressResolution {
            address,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        })
}

/// Allocate a non-blocking stream socket for `addr` with `options` applied.
fn open_socket(addr: SocketAddr, options: &TcpSocketConfig) -> Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(TcpError::SocketCreate)?;
    socket
        .set_nonblocking(true)
        .map_err(TcpError::NonBlockingMode)?;

    if options.no_delay {
        socket
            .set_nodelay(true)
            .map_err(|source| TcpError::SocketOption {
                option: "TCP_NODELAY",
                source,
            })?;
    }
    if let Some(idle) = options.keep_alive {
        socket
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
            .map_err(|source| TcpError::SocketOption {
                option: "SO_KEEPALIVE",
                source,
            })?;
    }

    Ok(socket)
}

#[cfg(unix)]
fn classify(err: &io::Error) -> Progress {
    match err.raw_os_error() {
        Some(libc::EINPROGRESS) | Some(libc::EALREADY) => Progress::Pending,
        Some(libc::EISCONN) => Progress::Established,
        _ => classify_kind(err),
    }
}

#[cfg(windows)]
fn classify(err: &io::Error) -> Progress {
    const WSAEINVAL: i32 = 10022;
    const WSAEALREADY: i32 = 10037;
    const WSAEISCONN: i32 = 10056;

    match err.raw_os_error() {
        Some(WSAEALREADY) | Some(WSAEINVAL) => Progress::Pending,
        Some(WSAEISCONN) => Progress::Established,
        _ => classify_kind(err),
    }
}

#[cfg(not(any(unix, windows)))]
fn classify(err: &io::Error) -> Progress {
    classify_kind(err)
}

fn classify_kind(err: &io::Error) -> Progress {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Progress::Pending,
        _ => Progress::Failed,
    }
}
