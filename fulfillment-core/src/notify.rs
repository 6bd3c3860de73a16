//! Notification bus.
//!
//! A broadcast channel of typed [`NotificationEvent`]s for real-time
//! consumers (station displays, captain devices). Delivery is best-effort:
//! publishing with no subscribers, or past a lagging subscriber, is not an
//! error.

use tokio::sync::broadcast;

use shared::event::NotificationEvent;

/// Default channel capacity — sized for bursts of ticket updates.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<NotificationEvent>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fire-and-forget publish. A send with no active receivers is normal.
    pub fn publish(&self, event: NotificationEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("notification published with no active subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
