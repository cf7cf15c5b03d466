//! Core systems for Horizon Tether.
//!
//! This crate provides the pieces shared by the Horizon Tether networking
//! crates:
//!
//! - **Signal/Slot System**: Type-safe observer registration and emission
//! - **Logging**: `tracing` targets and span helpers used across the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_tether_core::Signal;
//!
//! let disconnected = Signal::<(String, u16)>::new();
//!
//! let conn_id = disconnected.connect(|(host, port)| {
//!     println!("lost {host}:{port}");
//! });
//!
//! disconnected.emit(("127.0.0.1".to_string(), 7000));
//! disconnected.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal};
