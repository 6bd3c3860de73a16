//! Post-commit side effects.
//!
//! Managers collect an ordered list of effects (print jobs, notifications)
//! while their write transaction is open, and hand it to the bus only after
//! `commit()` returns. A failed dispatch is logged and swallowed — it can
//! never roll back, or even delay, the already-durable state change.

use tokio::sync::mpsc;

use shared::event::NotificationEvent;

use crate::notify::NotificationBus;
use crate::printing::PrintJob;

/// Default print queue depth.
const PRINT_QUEUE_CAPACITY: usize = 256;

/// One deferred side effect.
#[derive(Debug, Clone)]
pub enum SideEffect {
    Print(PrintJob),
    Notify(NotificationEvent),
}

/// Dispatches committed effects to the notification bus and print queue.
#[derive(Debug, Clone)]
pub struct EffectBus {
    notifications: NotificationBus,
    print_tx: mpsc::Sender<PrintJob>,
}

impl EffectBus {
    /// Build the bus; the returned receiver feeds
    /// [`crate::printing::run_print_worker`].
    pub fn new() -> (Self, mpsc::Receiver<PrintJob>) {
        let (print_tx, print_rx) = mpsc::channel(PRINT_QUEUE_CAPACITY);
        (
            Self {
                notifications: NotificationBus::new(),
                print_tx,
            },
            print_rx,
        )
    }

    /// Dispatch effects in order. Only called after the owning transaction
    /// has committed.
    pub fn dispatch(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::Print(job) => {
                    let label = job.describe();
                    if let Err(e) = self.print_tx.try_send(job) {
                        tracing::warn!(job = %label, error = %e, "print queue rejected job");
                    }
                }
                SideEffect::Notify(event) => self.notifications.publish(event),
            }
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NotificationEvent> {
        self.notifications.subscribe()
    }
}
