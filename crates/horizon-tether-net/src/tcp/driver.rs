//! Background thread that ticks a client at a fixed interval.
//!
//! Hosts without their own frame or event loop can hand a client to a
//! [`PollDriver`] instead of calling [`TcpClient::tick`] themselves. Signals
//! then fire on the driver thread.
//!
//! ```no_run
//! use std::time::Duration;
//! use horizon_tether_net::tcp::{PollDriver, TcpClient, TcpClientConfig};
//!
//! let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 7000));
//! client.data_received.connect(|data| println!("{} bytes", data.len()));
//! client.connect()?;
//!
//! let driver = PollDriver::spawn(client.clone(), Duration::from_millis(10))?;
//! // ...
//! driver.stop_and_join();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use horizon_tether_core::PerfSpan;
use horizon_tether_core::logging::{span_names, targets};
use parking_lot::Mutex;

use super::client::TcpClient;

/// Name given to the driver thread.
const THREAD_NAME: &str = "horizon-tether-poll";

/// Runs [`TcpClient::tick`] on a dedicated thread until stopped.
pub struct PollDriver {
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollDriver {
    /// Start ticking `client` every `interval`.
    pub fn spawn(client: Arc<TcpClient>, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                tracing::debug!(target: targets::DRIVER, ?interval, "poll driver started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let _span = PerfSpan::new(span_names::TICK);
                            if let Err(err) = client.tick() {
                                tracing::debug!(target: targets::DRIVER, error = %err, "tick failed");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                thread_running.store(false, Ordering::Release);
                tracing::debug!(target: targets::DRIVER, "poll driver stopped");
            })?;

        Ok(Self {
            stop_tx,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Whether the driver thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the driver thread to exit after its current tick.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Wait for the driver thread to exit.
    ///
    /// Returns `false` if the thread was already joined or panicked.
    pub fn join(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }

    /// Stop the driver and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        // Don't block in drop, just request shutdown.
        self.stop();
    }
}

impl std::fmt::Debug for PollDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollDriver")
            .field("running", &self.is_running())
            .finish()
    }
}
