//! Order discount entity

use serde::{Deserialize, Serialize};

/// What the discount applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "scope")]
pub enum DiscountScope {
    Order,
    Item { item_id: String },
}

/// How the discount amount is derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "value")]
pub enum DiscountValue {
    /// Percent of the order subtotal, or of the targeted item's line total.
    Percentage(f64),
    Flat(f64),
}

/// A priced adjustment attached to an order or a single item.
///
/// `amount` is the computed currency value persisted at apply time; it feeds
/// the discount total that tax computation subtracts before applying rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDiscount {
    pub id: String,
    pub order_id: String,
    pub scope: DiscountScope,
    pub value: DiscountValue,
    pub amount: f64,
    pub label: Option<String>,
    pub applied_by: String,
    pub cancelled: bool,
    pub created_at: i64,
}
