//! Authoritative totals recomputation.
//!
//! The single writer of order monetary fields. Every mutation that touches
//! items or discounts calls this before committing; nothing else may patch
//! the money columns.

use redb::WriteTransaction;

use shared::models::{Order, OrderItemStatus, OrderType};

use crate::config::OutletConfig;
use crate::error::CoreResult;
use crate::money::{self, BillBreakdown, ExtraCharges, TaxableLine};
use crate::storage::CoreStorage;
use crate::util;

/// Recompute and persist the order's totals from its non-cancelled items and
/// active discounts. Returns the full breakdown so billing can freeze it
/// into an invoice without recomputing.
pub(crate) fn recalculate_totals(
    storage: &CoreStorage,
    txn: &WriteTransaction,
    config: &OutletConfig,
    order: &mut Order,
) -> CoreResult<BillBreakdown> {
    let mut items = storage.items_for_order_txn(txn, &order.id)?;
    let discounts = storage.discounts_for_order_txn(txn, &order.id)?;

    let mut lines = Vec::new();
    let mut live_indices = Vec::new();
    for (idx, item) in items.iter_mut().enumerate() {
        if item.status == OrderItemStatus::Cancelled {
            continue;
        }
        let line_total = money::to_f64(
            money::to_decimal(item.unit_total()) * rust_decimal::Decimal::from(item.quantity),
        );
        item.line_total = line_total;
        lines.push(TaxableLine {
            line_total,
            components: item
                .tax
                .as_ref()
                .map(|t| t.components.clone())
                .unwrap_or_default(),
        });
        live_indices.push(idx);
    }

    let discount_total = money::to_f64(
        discounts
            .iter()
            .filter(|d| !d.cancelled)
            .map(|d| money::to_decimal(d.amount))
            .sum(),
    );

    // Service charge is a dine-in rule; splits and other channels pass none.
    let service_rule = if order.order_type == OrderType::DineIn {
        config.service_charge.as_ref()
    } else {
        None
    };

    let bill = money::compute_bill(
        &lines,
        discount_total,
        service_rule,
        ExtraCharges {
            packaging: order.packaging_charge,
            delivery: order.delivery_charge,
        },
        config.interstate,
    );

    for (slot, idx) in live_indices.iter().enumerate() {
        items[*idx].tax_amount = bill.line_taxes[slot];
        storage.put_item(txn, &items[*idx])?;
    }

    order.subtotal = bill.subtotal;
    order.discount_total = bill.discount_total;
    order.taxable_amount = bill.taxable_amount;
    order.tax_total = bill.tax_total;
    order.service_charge = bill.service_charge;
    order.round_off = bill.round_off;
    order.grand_total = bill.grand_total;
    order.updated_at = util::now_millis();
    storage.put_order(txn, order)?;

    Ok(bill)
}
