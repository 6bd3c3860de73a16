//! Order item entity

use serde::{Deserialize, Serialize};

use super::station::StationRef;

/// Item lifecycle. Quantity and price freeze once the item leaves `PENDING`;
/// after that the only edit is cancellation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    #[default]
    Pending,
    SentToKitchen,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Pending => "PENDING",
            OrderItemStatus::SentToKitchen => "SENT_TO_KITCHEN",
            OrderItemStatus::Preparing => "PREPARING",
            OrderItemStatus::Ready => "READY",
            OrderItemStatus::Served => "SERVED",
            OrderItemStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Cancellation scope tag recorded on cancel events.
///
/// Both the ticketed and un-ticketed cancel paths use this same enum — the
/// tag is deliberately shared so downstream reporting sees one vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelKind {
    FullItem,
    PartialItem,
}

/// One tax component rate recorded on a line (e.g. CGST at 2.5%).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxComponentRate {
    pub code: String,
    pub rate: f64,
}

/// Tax configuration snapshot for a line, taken from the menu's tax group at
/// add time. A missing detail degrades to zero tax for the line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemTaxDetail {
    pub group_id: String,
    pub components: Vec<TaxComponentRate>,
}

/// Addon attached to an order item, owned by the item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemAddon {
    pub addon_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
}

/// One ordered dish/variant instance, owned exclusively by its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    pub variant_id: Option<String>,
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub unit_price: f64,
    #[serde(default)]
    pub addons: Vec<OrderItemAddon>,
    pub note: Option<String>,
    /// Target preparation station; `None` routes to the default kitchen.
    pub station: Option<StationRef>,
    pub tax: Option<ItemTaxDetail>,

    // Computed by totals recalculation.
    pub line_total: f64,
    pub tax_amount: f64,

    pub status: OrderItemStatus,
    /// Set when the item is consumed into a ticket.
    pub ticket_id: Option<String>,
    pub created_at: i64,
}

impl OrderItem {
    /// Per-unit price including addons.
    pub fn unit_total(&self) -> f64 {
        let addons: f64 = self
            .addons
            .iter()
            .map(|a| a.price * a.quantity as f64)
            .sum();
        self.unit_price + addons
    }
}
