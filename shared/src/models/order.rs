//! Order entity and lifecycle

use serde::{Deserialize, Serialize};

/// Transaction channel for an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    DineIn,
    Takeaway,
    Delivery,
}

/// Order lifecycle.
///
/// `PENDING → CONFIRMED → PREPARING → READY → SERVED → BILLED → PAID`,
/// with `CANCELLED` reachable while nothing has been paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Billed,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Whether item mutations (add, quantity edit, KOT send) are still legal.
    pub fn accepts_item_changes(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Billed | OrderStatus::Paid | OrderStatus::Cancelled
        )
    }

    /// Cancellation is allowed while nothing has been paid — up through
    /// `Served`, plus `Billed` while its invoice is still unpaid (the
    /// cascade cancels that invoice along with the order).
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::Served
                | OrderStatus::Billed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Served => "SERVED",
            OrderStatus::Billed => "BILLED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// One dine-in/takeaway/delivery transaction.
///
/// Monetary fields are always the output of the totals recomputation over the
/// order's non-cancelled items and active discounts — never hand-edited.
/// `grand_total` is an integer currency amount; `round_off` is the signed
/// difference absorbed by rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Human-readable number, unique per outlet per business day.
    pub order_number: String,
    pub outlet_id: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub table_id: Option<String>,
    pub session_id: Option<String>,

    pub subtotal: f64,
    pub discount_total: f64,
    pub taxable_amount: f64,
    pub tax_total: f64,
    pub service_charge: f64,
    pub packaging_charge: f64,
    pub delivery_charge: f64,
    pub round_off: f64,
    pub grand_total: f64,

    pub created_by: String,
    pub created_by_name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub cancel_reason: Option<String>,
}
