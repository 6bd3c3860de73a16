//! Notification events published on the engine's broadcast bus.
//!
//! Delivery is best-effort and fire-and-forget: events go out only after the
//! owning transaction commits, and a lagging or absent subscriber never
//! affects the committed state.

use serde::{Deserialize, Serialize};

use crate::models::{CancelKind, InvoiceStatus};

/// Event payload, tagged with the wire event name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NotificationPayload {
    #[serde(rename = "order:created")]
    OrderCreated { order_id: String },
    #[serde(rename = "order:items_added")]
    OrderItemsAdded {
        order_id: String,
        item_ids: Vec<String>,
    },
    #[serde(rename = "order:item_cancelled")]
    OrderItemCancelled {
        order_id: String,
        item_id: String,
        kind: CancelKind,
    },
    #[serde(rename = "order:cancelled")]
    OrderCancelled { order_id: String },
    #[serde(rename = "order:kot_sent")]
    OrderKotSent {
        order_id: String,
        ticket_ids: Vec<String>,
    },
    #[serde(rename = "kot:created")]
    KotCreated {
        ticket_id: String,
        station_id: String,
    },
    #[serde(rename = "kot:accepted")]
    KotAccepted { ticket_id: String },
    #[serde(rename = "kot:preparing")]
    KotPreparing { ticket_id: String },
    #[serde(rename = "kot:ready")]
    KotReady { ticket_id: String },
    #[serde(rename = "kot:served")]
    KotServed { ticket_id: String },
    #[serde(rename = "kot:cancelled")]
    KotCancelled { ticket_id: String },
    #[serde(rename = "bill:status")]
    BillStatus {
        order_id: String,
        invoice_id: String,
        status: InvoiceStatus,
    },
}

/// Envelope carrying the outlet scope and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub outlet_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

impl NotificationEvent {
    pub fn new(outlet_id: impl Into<String>, timestamp: i64, payload: NotificationPayload) -> Self {
        Self {
            outlet_id: outlet_id.into(),
            timestamp,
            payload,
        }
    }
}
