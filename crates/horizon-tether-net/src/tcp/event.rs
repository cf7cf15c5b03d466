//! Inbound events and drainable event queues.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;

/// An event produced by the receive side of a [`TcpClient`](super::TcpClient).
///
/// Events are not persisted or retried: each observer sees an event at most
/// once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Bytes read from the server, in arrival order.
    DataReceived(Vec<u8>),
    /// The server closed the connection in an orderly way.
    RemoteDisconnected {
        /// Host of the connection that was closed.
        host: String,
        /// Port of the connection that was closed.
        port: u16,
    },
}

/// The receiving end of a client event queue, created by
/// [`TcpClient::subscribe`](super::TcpClient::subscribe).
///
/// The host drains it at its own pace; dropping the receiver unsubscribes.
#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<InboundEvent>,
}

impl EventReceiver {
    /// Take the next queued event without blocking.
    pub fn try_next(&self) -> Option<InboundEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every queued event without blocking.
    pub fn drain(&self) -> Vec<InboundEvent> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: std::time::Duration) -> Option<InboundEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Number of events waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Fan-out of events to every live [`EventReceiver`].
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<Sender<InboundEvent>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        EventReceiver { rx }
    }

    /// Queue `event` for every subscriber, dropping the ones whose receiver is gone.
    pub(crate) fn publish(&self, event: &InboundEvent) {
        self.senders
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }
}
