//! Connection counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of a client's lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Connect calls that got past the already-connected check.
    pub connect_calls: u64,
    /// Individual socket connect attempts across all connect calls.
    pub connect_attempts: u64,
    /// Connect calls that reached the connected state.
    pub connections_established: u64,
    /// Bytes accepted by the kernel for sending.
    pub bytes_sent: u64,
    /// Bytes returned by polls.
    pub bytes_received: u64,
    /// Orderly closes initiated by the server.
    pub remote_disconnects: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    connect_calls: AtomicU64,
    connect_attempts: AtomicU64,
    connections_established: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    remote_disconnects: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_connect_call(&self) {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_disconnect(&self) {
        self.remote_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            connect_calls: self.connect_calls.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            remote_disconnects: self.remote_disconnects.load(Ordering::Relaxed),
        }
    }
}
