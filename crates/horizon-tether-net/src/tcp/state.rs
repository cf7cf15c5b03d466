//! Connection state for the TCP client.

/// Current state of a TCP client connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TcpConnectionState {
    /// No socket is held.
    #[default]
    Disconnected,
    /// A socket exists and connect attempts are running.
    Connecting,
    /// Connected and ready to send/receive data.
    Connected,
}

impl std::fmt::Display for TcpConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
