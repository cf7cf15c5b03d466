//! Managed TCP client with poll-driven, signal-based event delivery.
//!
//! This module provides:
//! - **TcpClient**: Connect to a TCP server with bounded retries and auto-reconnect
//! - **PollDriver**: Tick a client from a background thread
//! - **EventReceiver**: Drain client events from a queue instead of signals
//!
//! The client never spawns threads on its own. The host calls
//! [`TcpClient::tick`] from its scheduling loop (or hands the client to a
//! [`PollDriver`]), and every tick performs at most one non-blocking read.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use horizon_tether_net::tcp::{TcpClient, TcpClientConfig};
//!
//! let config = TcpClientConfig::new("127.0.0.1", 7000)
//!     .no_delay(true)
//!     .max_reconnect_attempts(10)
//!     .retry_interval(Duration::from_millis(500));
//!
//! let client = TcpClient::new(config);
//! let events = client.subscribe();
//!
//! client.connect()?;
//! client.send(b"ping")?;
//!
//! loop {
//!     client.tick()?;
//!     for event in events.drain() {
//!         println!("{event:?}");
//!     }
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! # Ok::<(), horizon_tether_net::TcpError>(())
//! ```

mod client;
mod config;
mod connector;
mod driver;
mod event;
mod poller;
mod state;
mod stats;

pub use client::TcpClient;
pub use config::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECEIVE_BUFFER_SIZE, DEFAULT_RETRY_INTERVAL,
    TcpClientConfig, TcpSocketConfig,
};
pub use driver::PollDriver;
pub use event::{EventReceiver, InboundEvent};
pub use state::TcpConnectionState;
pub use stats::ConnectionStats;
