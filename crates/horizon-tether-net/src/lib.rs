//! Networking for Horizon Tether.
//!
//! This crate provides a managed TCP client for hosts that drive I/O from
//! their own loop: a frame loop, a game tick, or a simple timer thread.
//!
//! - Connects with a bounded number of non-blocking attempts
//! - Reads without blocking, once per host tick
//! - Reconnects on its own after the server closes the connection
//! - Delivers inbound data and disconnects through signals or event queues
//!
//! See the [`tcp`] module for details.
//!
//! # Logging
//!
//! The crate logs through [`tracing`]. Targets are listed in
//! [`horizon_tether_core::logging::targets`].

mod error;
pub mod tcp;

pub use error::{Result, TcpError};
