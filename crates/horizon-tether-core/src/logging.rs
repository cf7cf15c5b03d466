//! Logging facilities for Horizon Tether.
//!
//! Horizon Tether instruments itself with the `tracing` crate and never
//! installs a subscriber. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_tether_net=debug")
//!     .init();
//! ```
//!
//! Every event is emitted with one of the [`targets`] below, so a filter
//! directive can narrow output to a single subsystem (for example
//! `horizon_tether_net::connect=info` to follow connection attempts only).

/// Span names used throughout Horizon Tether for tracing.
pub mod span_names {
    /// A full connect call, including every retry.
    pub const CONNECT: &str = "horizon_tether::connect";
    /// One poll driver tick.
    pub const TICK: &str = "horizon_tether::tick";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_tether_core::signal";
    /// Client lifecycle (send, close, config changes).
    pub const TCP: &str = "horizon_tether_net::tcp";
    /// Connection establishment and retries.
    pub const CONNECT: &str = "horizon_tether_net::connect";
    /// Receive polling.
    pub const POLL: &str = "horizon_tether_net::poll";
    /// Background poll driver.
    pub const DRIVER: &str = "horizon_tether_net::driver";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// Useful for attributing every event of a multi-step operation (such as a
/// connect with retries) to one span.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new span for `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_tether::perf", "perf", operation);
        Self {
            span: span.entered(),
        }
    }
}
