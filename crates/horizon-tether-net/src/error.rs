//! Error types for the networking module.

use std::io;
use std::path::PathBuf;

use crate::tcp::TcpConnectionState;

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, TcpError>;

/// Errors reported by the TCP client.
///
/// Transient conditions (a receive that would block, a connect still in
/// progress) never show up here; they are absorbed by the client. An orderly
/// remote close is delivered as an event, not as an error.
#[derive(Debug, thiserror::Error)]
pub enum TcpError {
    /// `connect` was called while a connection is already established.
    #[error("Already connected to {address}")]
    AlreadyConnected { address: String },

    /// The target host could not be resolved to a socket address.
    #[error("Failed to resolve {address}: {source}")]
    AddressResolution {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The OS refused to allocate a socket.
    #[error("Failed to create socket: {0}")]
    SocketCreate(#[source] io::Error),

    /// The socket could not be switched to non-blocking mode.
    #[error("Could not set socket to non-blocking: {0}")]
    NonBlockingMode(#[source] io::Error),

    /// A socket option could not be applied before connecting.
    #[error("Failed to set {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    /// Every connect attempt in the budget failed or timed out.
    #[error("Failed to connect to {address} after {attempts} attempt(s)")]
    ConnectFailed {
        address: String,
        attempts: u32,
        /// The last hard failure, if any attempt produced one.
        #[source]
        source: Option<io::Error>,
    },

    /// The operation needs an established connection.
    #[error("Not connected to server")]
    NotConnected,

    /// The write failed or the kernel would not accept more bytes.
    #[error("Failed to send data ({written} byte(s) written): {source}")]
    Send {
        written: usize,
        #[source]
        source: io::Error,
    },

    /// A read failed with something other than "would block".
    #[error("Failed to receive data from server: {0}")]
    Receive(#[source] io::Error),

    /// The configuration has an out-of-range value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration changes are only accepted while disconnected.
    #[error("Configuration is locked while the client is {state}")]
    ConfigLocked { state: TcpConnectionState },

    /// A TOML configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TcpError {
    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a send error.
    pub fn send(written: usize, source: io::Error) -> Self {
        Self::Send { written, source }
    }

    /// Whether this error came from local resource setup rather than the peer.
    ///
    /// Setup failures abort a connect call without consuming retry budget.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::AddressResolution { .. }
                | Self::SocketCreate(_)
                | Self::NonBlockingMode(_)
                | Self::SocketOption { .. }
        )
    }

    /// Whether retrying the same call later may succeed without any change.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Send { source, .. } | Self::Receive(source) => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            Self::ConnectFailed { .. } => true,
            _ => false,
        }
    }
}
