//! Invoice entity

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Invoice lifecycle. Cancellable only while unpaid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Paid,
    Cancelled,
}

/// One entry of the frozen tax breakup, keyed by component code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaxComponentBreakup {
    pub rate: f64,
    pub taxable_amount: f64,
    pub tax_amount: f64,
}

/// Payment recorded against an invoice at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub method: String,
    pub amount: f64,
    pub received_by: String,
    pub received_at: i64,
}

/// The billed snapshot of an order.
///
/// At most one non-cancelled full invoice exists per order at any time;
/// re-requesting a bill returns the existing row. The tax breakup and totals
/// are frozen at generation — later order mutations are rejected instead of
/// re-opening the invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    /// Sequential number scoped to outlet + calendar year.
    pub invoice_number: String,
    pub order_id: String,
    pub outlet_id: String,
    pub status: InvoiceStatus,
    /// Set for invoices produced by a split; split invoices bill a subset of
    /// the order's items and never carry a service charge.
    pub split_item_ids: Option<Vec<String>>,

    pub subtotal: f64,
    pub discount_total: f64,
    pub taxable_amount: f64,
    pub tax_breakup: BTreeMap<String, TaxComponentBreakup>,
    pub tax_total: f64,
    pub service_charge: f64,
    pub packaging_charge: f64,
    pub delivery_charge: f64,
    pub round_off: f64,
    pub grand_total: f64,
    pub amount_in_words: String,

    pub payment: Option<PaymentRecord>,
    pub created_by: String,
    pub created_at: i64,
    pub cancelled_at: Option<i64>,
}

impl Invoice {
    pub fn is_active(&self) -> bool {
        self.status != InvoiceStatus::Cancelled
    }
}
