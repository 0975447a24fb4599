//! Bounded, best-effort conduit from the change detector to the index
//! owner.
//!
//! Delivery is at most once. The sending side never blocks: when the buffer
//! is full or the receiver is gone the event is dropped and is not retried.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::event::ChangeEvent;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Create a bounded event channel. A capacity of zero is raised to one.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ChangeEvent>,
}

impl EventSender {
    /// Offer an event without blocking.
    ///
    /// Returns whether the event was enqueued. A dropped event is logged at
    /// debug level and otherwise forgotten.
    pub fn send(&self, event: ChangeEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                tracing::debug!(
                    folder = %ev.folder_name,
                    "event channel full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(ev)) => {
                tracing::debug!(
                    folder = %ev.folder_name,
                    "event channel closed, dropping event"
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once every sender is gone and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Take the next buffered event, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}
