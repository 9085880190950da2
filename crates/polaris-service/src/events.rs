//! Host event channel.
//!
//! Platform callbacks (location updates, cell-info changes, permission
//! changes) are pushed onto a bounded queue consumed by the collector task.

use polaris_types::HostEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiver end, owned by the collector.
pub type EventReceiver = mpsc::Receiver<HostEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, rx)
}

/// Producer handle given to whatever bridges the host platform.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<HostEvent>,
}

impl EventSender {
    /// Fire-and-forget delivery for platform callbacks.
    ///
    /// Never blocks the caller. Returns false if the event was dropped
    /// because the queue is full or the collector has stopped.
    pub fn dispatch(&self, event: HostEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event queue full, dropping host event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Collector stopped, dropping host event");
                false
            }
        }
    }

    /// Deliver an event, waiting for queue space.
    ///
    /// Returns false if the collector has stopped.
    pub async fn send(&self, event: HostEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Whether the collector has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
