//! Kitchen/Bar Order Ticket entities

use serde::{Deserialize, Serialize};

use super::station::StationRef;

/// Ticket lifecycle. `CANCELLED` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Pending,
    Accepted,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Served | TicketStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Accepted => "ACCEPTED",
            TicketStatus::Preparing => "PREPARING",
            TicketStatus::Ready => "READY",
            TicketStatus::Served => "SERVED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Per-item sub-machine mirroring the ticket lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KotItemStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl KotItemStatus {
    /// Counts toward the ticket's auto-ready check.
    pub fn is_done(&self) -> bool {
        matches!(self, KotItemStatus::Ready | KotItemStatus::Served)
    }
}

/// Thin pointer back to an order item plus a denormalized snapshot for the
/// station display and the printed slip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KotItem {
    pub id: String,
    pub order_item_id: String,
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub instructions: Option<String>,
    pub status: KotItemStatus,
}

/// A station-scoped batch of items sent together.
///
/// Auto-advances to `READY` when every non-cancelled item is ready/served,
/// and is force-cancelled when every item cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KotTicket {
    pub id: String,
    /// Per-station, per-day sequence: `KOT20250807-003` / `BOT20250807-001`.
    pub ticket_number: String,
    pub order_id: String,
    pub outlet_id: String,
    pub station: StationRef,
    pub status: TicketStatus,
    pub priority: bool,
    pub items: Vec<KotItem>,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub served_at: Option<i64>,
}

impl KotTicket {
    pub fn item(&self, kot_item_id: &str) -> Option<&KotItem> {
        self.items.iter().find(|i| i.id == kot_item_id)
    }

    /// True when every non-cancelled item has reached ready/served.
    pub fn all_items_done(&self) -> bool {
        let mut saw_live = false;
        for item in &self.items {
            if item.status == KotItemStatus::Cancelled {
                continue;
            }
            saw_live = true;
            if !item.status.is_done() {
                return false;
            }
        }
        saw_live
    }

    /// True when every item has been cancelled.
    pub fn all_items_cancelled(&self) -> bool {
        self.items
            .iter()
            .all(|i| i.status == KotItemStatus::Cancelled)
    }
}
