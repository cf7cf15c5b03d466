//! Configuration types for the TCP client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TcpError};

/// Default number of connect attempts per connect call ("effectively unbounded").
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 1_000_000;
/// Default receive buffer size in bytes.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 1024;
/// Default wait between connect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Socket-level options applied before connecting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpSocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Keep-alive idle time. `None` disables keep-alive.
    #[serde(
        rename = "keep_alive_ms",
        with = "option_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub keep_alive: Option<Duration>,
}

impl TcpSocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the keep-alive idle time.
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// Disable keep-alive.
    pub fn no_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }
}

/// Configuration for a TCP client connection.
///
/// The configuration is fixed for the duration of a connection lifecycle;
/// [`TcpClient`](super::TcpClient) only accepts changes while disconnected.
///
/// # TOML
///
/// ```toml
/// host = "127.0.0.1"
/// port = 7000
/// auto_reconnect = true
/// max_reconnect_attempts = 5
/// retry_interval_ms = 500
/// receive_buffer_size = 4096
///
/// [socket]
/// no_delay = true
/// keep_alive_ms = 30000
/// ```
///
/// Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpClientConfig {
    /// The host to connect to (name or IP literal).
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Keep retrying on connect failure and reconnect after the server
    /// closes the connection.
    pub auto_reconnect: bool,
    /// Total connect attempts per connect call. `0` means never retry, which
    /// still makes one attempt.
    pub max_reconnect_attempts: u32,
    /// Wait between connect attempts. An in-progress handshake is given this
    /// long to complete before the attempt counts as failed.
    #[serde(rename = "retry_interval_ms", with = "millis")]
    pub retry_interval: Duration,
    /// Bytes read per poll tick.
    pub receive_buffer_size: u32,
    /// Treat receive errors as a remote disconnect instead of reporting them
    /// and keeping the connection.
    pub strict_receive_errors: bool,
    /// Socket-level options.
    pub socket: TcpSocketConfig,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            auto_reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            strict_receive_errors: false,
            socket: TcpSocketConfig::default(),
        }
    }
}

impl TcpClientConfig {
    /// Create a new client configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate_options()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TcpError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Enable or disable auto-reconnect.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the number of connect attempts per connect call.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the wait between connect attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the number of bytes read per poll tick.
    pub fn receive_buffer_size(mut self, size: u32) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Treat receive errors as a remote disconnect.
    pub fn strict_receive_errors(mut self, enabled: bool) -> Self {
        self.strict_receive_errors = enabled;
        self
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set keep-alive idle time.
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.socket.keep_alive = Some(interval);
        self
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of attempts a connect call makes.
    pub fn attempt_budget(&self) -> u32 {
        self.max_reconnect_attempts.max(1)
    }

    /// Check the whole configuration, target included.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TcpError::invalid_config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(TcpError::invalid_config("port must be in 1..=65535"));
        }
        self.validate_options()
    }

    /// Check everything except the target, which may be supplied at connect time.
    pub fn validate_options(&self) -> Result<()> {
        if self.receive_buffer_size == 0 {
            return Err(TcpError::invalid_config(
                "receive_buffer_size must be positive",
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
