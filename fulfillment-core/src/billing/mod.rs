//! Invoice/billing manager.
//!
//! Generates the single active invoice per order (idempotently), supports
//! split and cancellation, records settlement and applies discounts. An
//! invoice freezes the tax breakup computed on the discounted taxable
//! amount; discounts never touch tax directly — the totals recomputation is
//! what realizes the tax-on-discounted-subtotal rule.

mod words;

#[cfg(test)]
mod tests;

pub use words::amount_in_words;

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::Actor;
use shared::event::{NotificationEvent, NotificationPayload};
use shared::models::{
    DiscountScope, DiscountValue, Invoice, InvoiceStatus, Order, OrderDiscount, OrderItemStatus,
    OrderStatus, PaymentRecord,
};

use crate::config::OutletConfig;
use crate::effects::{EffectBus, SideEffect};
use crate::error::{CoreError, CoreResult};
use crate::money::{self, ExtraCharges, TaxableLine};
use crate::orders::{ensure_can_modify, load_order, recalculate_totals};
use crate::printing::{BillPrint, PrintJob};
use crate::storage::CoreStorage;
use crate::util;

/// Discount application parameters.
#[derive(Debug, Clone)]
pub struct DiscountRequest {
    pub scope: DiscountScope,
    pub value: DiscountValue,
    pub label: Option<String>,
}

pub struct BillingManager {
    storage: CoreStorage,
    config: Arc<OutletConfig>,
    effects: EffectBus,
}

impl BillingManager {
    pub fn new(storage: CoreStorage, config: Arc<OutletConfig>, effects: EffectBus) -> Self {
        Self {
            storage,
            config,
            effects,
        }
    }

    fn notify(&self, payload: NotificationPayload) -> SideEffect {
        SideEffect::Notify(NotificationEvent::new(
            self.config.outlet_id.clone(),
            util::now_millis(),
            payload,
        ))
    }

    fn next_invoice_number(&self, txn: &redb::WriteTransaction) -> CoreResult<String> {
        let year = util::business_year(self.config.timezone);
        let seq = self.storage.next_sequence(
            txn,
            &format!("inv:{}:{}", self.config.outlet_id, year),
        )?;
        Ok(format!("{}{}-{:05}", self.config.invoice_prefix, year, seq))
    }

    fn bill_print(&self, invoice: &Invoice, order: &Order) -> SideEffect {
        SideEffect::Print(PrintJob::Bill(BillPrint {
            invoice_number: invoice.invoice_number.clone(),
            order_number: order.order_number.clone(),
            table_id: order.table_id.clone(),
            grand_total: invoice.grand_total,
            amount_in_words: invoice.amount_in_words.clone(),
            timestamp: util::now_millis(),
        }))
    }

    /// Generate the bill for an order.
    ///
    /// Idempotent: when a non-cancelled invoice already exists it is
    /// returned unchanged instead of creating a duplicate.
    pub fn generate_bill(&self, order_id: &str, actor: &Actor) -> CoreResult<Invoice> {
        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if order.status == OrderStatus::Paid {
            return Err(CoreError::OrderAlreadyPaid(order.id));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "generate bill",
            ));
        }

        let existing = self
            .storage
            .invoices_for_order_txn(&txn, order_id)?
            .into_iter()
            .find(|i| i.is_active());
        if let Some(invoice) = existing {
            // Re-requesting a bill returns the live invoice; drop the txn.
            return Ok(invoice);
        }

        let bill = recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: self.next_invoice_number(&txn)?,
            order_id: order.id.clone(),
            outlet_id: self.config.outlet_id.clone(),
            status: InvoiceStatus::Unpaid,
            split_item_ids: None,
            subtotal: bill.subtotal,
            discount_total: bill.discount_total,
            taxable_amount: bill.taxable_amount,
            tax_breakup: bill.breakup,
            tax_total: bill.tax_total,
            service_charge: bill.service_charge,
            packaging_charge: bill.packaging_charge,
            delivery_charge: bill.delivery_charge,
            round_off: bill.round_off,
            grand_total: bill.grand_total,
            amount_in_words: amount_in_words(bill.grand_total),
            payment: None,
            created_by: actor.id.clone(),
            created_at: util::now_millis(),
            cancelled_at: None,
        };
        self.storage.put_invoice(&txn, &invoice)?;

        order.status = OrderStatus::Billed;
        order.updated_at = util::now_millis();
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            invoice = %invoice.invoice_number,
            grand_total = invoice.grand_total,
            "bill generated"
        );
        self.effects.dispatch(vec![
            self.notify(NotificationPayload::BillStatus {
                order_id: order.id.clone(),
                invoice_id: invoice.id.clone(),
                status: invoice.status,
            }),
            self.bill_print(&invoice, &order),
        ]);
        Ok(invoice)
    }

    /// Partition item groups into independent invoices.
    ///
    /// Each split is computed on its own item subset with no service charge;
    /// order-level discounts are allocated by each group's share of the
    /// subtotal. The order goes to `BILLED` once all splits exist.
    pub fn split_bill(
        &self,
        order_id: &str,
        actor: &Actor,
        groups: Vec<Vec<String>>,
    ) -> CoreResult<Vec<Invoice>> {
        if groups.is_empty() || groups.iter().any(|g| g.is_empty()) {
            return Err(CoreError::InvalidOperation(
                "split groups must be non-empty".to_string(),
            ));
        }

        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if order.status == OrderStatus::Paid {
            return Err(CoreError::OrderAlreadyPaid(order.id));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "split bill",
            ));
        }
        if self
            .storage
            .invoices_for_order_txn(&txn, order_id)?
            .iter()
            .any(|i| i.is_active())
        {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "split bill",
            ));
        }

        // Refresh line totals before partitioning.
        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        let items = self.storage.items_for_order_txn(&txn, order_id)?;
        let discounts = self.storage.discounts_for_order_txn(&txn, order_id)?;

        let mut seen = HashSet::new();
        for id in groups.iter().flatten() {
            if !seen.insert(id.clone()) {
                return Err(CoreError::InvalidOperation(format!(
                    "item {} appears in more than one split group",
                    id
                )));
            }
        }

        let order_subtotal = money::to_decimal(order.subtotal);
        let order_level_discount: Decimal = discounts
            .iter()
            .filter(|d| !d.cancelled && matches!(d.scope, DiscountScope::Order))
            .map(|d| money::to_decimal(d.amount))
            .sum();

        let now = util::now_millis();
        let mut invoices = Vec::with_capacity(groups.len());
        for group in &groups {
            let mut lines = Vec::new();
            let mut group_subtotal = Decimal::ZERO;
            let mut group_discount = Decimal::ZERO;
            for item_id in group {
                let item = items
                    .iter()
                    .find(|i| &i.id == item_id)
                    .ok_or_else(|| CoreError::not_found("order item", item_id))?;
                if item.status == OrderItemStatus::Cancelled {
                    return Err(CoreError::invalid_transition(
                        "order item",
                        item.status.as_str(),
                        "split bill",
                    ));
                }
                group_subtotal += money::to_decimal(item.line_total);
                lines.push(TaxableLine {
                    line_total: item.line_total,
                    components: item
                        .tax
                        .as_ref()
                        .map(|t| t.components.clone())
                        .unwrap_or_default(),
                });
                group_discount += discounts
                    .iter()
                    .filter(|d| {
                        !d.cancelled
                            && matches!(&d.scope, DiscountScope::Item { item_id: id } if id == item_id)
                    })
                    .map(|d| money::to_decimal(d.amount))
                    .sum::<Decimal>();
            }
            if order_subtotal > Decimal::ZERO {
                group_discount += order_level_discount * group_subtotal / order_subtotal;
            }

            let bill = money::compute_bill(
                &lines,
                money::to_f64(group_discount),
                None,
                ExtraCharges::default(),
                self.config.interstate,
            );
            let invoice = Invoice {
                id: Uuid::new_v4().to_string(),
                invoice_number: self.next_invoice_number(&txn)?,
                order_id: order.id.clone(),
                outlet_id: self.config.outlet_id.clone(),
                status: InvoiceStatus::Unpaid,
                split_item_ids: Some(group.clone()),
                subtotal: bill.subtotal,
                discount_total: bill.discount_total,
                taxable_amount: bill.taxable_amount,
                tax_breakup: bill.breakup,
                tax_total: bill.tax_total,
                service_charge: bill.service_charge,
                packaging_charge: bill.packaging_charge,
                delivery_charge: bill.delivery_charge,
                round_off: bill.round_off,
                grand_total: bill.grand_total,
                amount_in_words: amount_in_words(bill.grand_total),
                payment: None,
                created_by: actor.id.clone(),
                created_at: now,
                cancelled_at: None,
            };
            self.storage.put_invoice(&txn, &invoice)?;
            invoices.push(invoice);
        }

        order.status = OrderStatus::Billed;
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, splits = invoices.len(), "bill split");
        let mut effects = Vec::new();
        for invoice in &invoices {
            effects.push(self.notify(NotificationPayload::BillStatus {
                order_id: order.id.clone(),
                invoice_id: invoice.id.clone(),
                status: invoice.status,
            }));
            effects.push(self.bill_print(invoice, &order));
        }
        self.effects.dispatch(effects);
        Ok(invoices)
    }

    /// Cancel an unpaid invoice and revert the order to `SERVED`.
    pub fn cancel_invoice(&self, invoice_id: &str) -> CoreResult<Invoice> {
        let txn = self.storage.begin_write()?;
        let mut invoice = self
            .storage
            .get_invoice_txn(&txn, invoice_id)?
            .ok_or_else(|| CoreError::not_found("invoice", invoice_id))?;
        match invoice.status {
            InvoiceStatus::Paid => return Err(CoreError::InvoicePaid(invoice.id)),
            InvoiceStatus::Cancelled => {
                return Err(CoreError::invalid_transition(
                    "invoice",
                    "CANCELLED",
                    "cancel",
                ));
            }
            InvoiceStatus::Unpaid => {}
        }

        invoice.status = InvoiceStatus::Cancelled;
        invoice.cancelled_at = Some(util::now_millis());
        self.storage.put_invoice(&txn, &invoice)?;

        let mut order = load_order(&self.storage, &txn, &invoice.order_id)?;
        if order.status == OrderStatus::Billed {
            order.status = OrderStatus::Served;
            order.updated_at = util::now_millis();
            self.storage.put_order(&txn, &order)?;
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(invoice = %invoice.invoice_number, "invoice cancelled");
        self.effects
            .dispatch(vec![self.notify(NotificationPayload::BillStatus {
                order_id: invoice.order_id.clone(),
                invoice_id: invoice.id.clone(),
                status: invoice.status,
            })]);
        Ok(invoice)
    }

    /// Record payment against an invoice. The order advances to `PAID` (and
    /// its table session closes) once every live invoice is settled.
    pub fn settle_invoice(
        &self,
        invoice_id: &str,
        actor: &Actor,
        method: impl Into<String>,
    ) -> CoreResult<Invoice> {
        let txn = self.storage.begin_write()?;
        let mut invoice = self
            .storage
            .get_invoice_txn(&txn, invoice_id)?
            .ok_or_else(|| CoreError::not_found("invoice", invoice_id))?;
        match invoice.status {
            InvoiceStatus::Paid => return Err(CoreError::InvoicePaid(invoice.id)),
            InvoiceStatus::Cancelled => {
                return Err(CoreError::invalid_transition(
                    "invoice",
                    "CANCELLED",
                    "settle",
                ));
            }
            InvoiceStatus::Unpaid => {}
        }

        let now = util::now_millis();
        invoice.status = InvoiceStatus::Paid;
        invoice.payment = Some(PaymentRecord {
            method: method.into(),
            amount: invoice.grand_total,
            received_by: actor.id.clone(),
            received_at: now,
        });
        self.storage.put_invoice(&txn, &invoice)?;

        let mut order = load_order(&self.storage, &txn, &invoice.order_id)?;
        let all_settled = self
            .storage
            .invoices_for_order_txn(&txn, &order.id)?
            .iter()
            .filter(|i| i.is_active())
            .all(|i| i.status == InvoiceStatus::Paid);
        if all_settled && order.status == OrderStatus::Billed {
            order.status = OrderStatus::Paid;
            order.updated_at = now;
            self.storage.put_order(&txn, &order)?;
            if let Some(session_id) = &order.session_id
                && let Some(mut session) = self.storage.get_session_txn(&txn, session_id)?
                && session.is_open()
            {
                session.closed_at = Some(now);
                self.storage.put_session(&txn, &session)?;
            }
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(invoice = %invoice.invoice_number, "invoice settled");
        self.effects
            .dispatch(vec![self.notify(NotificationPayload::BillStatus {
                order_id: invoice.order_id.clone(),
                invoice_id: invoice.id.clone(),
                status: invoice.status,
            })]);
        Ok(invoice)
    }

    /// Apply a discount and recompute totals — tax lands on the discounted
    /// subtotal through the recomputation, never by editing tax directly.
    pub fn apply_discount(
        &self,
        order_id: &str,
        actor: &Actor,
        req: DiscountRequest,
    ) -> CoreResult<OrderDiscount> {
        if let DiscountValue::Percentage(pct) = req.value
            && !(0.0..=100.0).contains(&pct)
        {
            return Err(CoreError::InvalidOperation(format!(
                "discount percent must be between 0 and 100, got {}",
                pct
            )));
        }
        if let DiscountValue::Flat(value) = req.value
            && value < 0.0
        {
            return Err(CoreError::InvalidOperation(
                "flat discount must be non-negative".to_string(),
            ));
        }

        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "apply discount",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let items = self.storage.items_for_order_txn(&txn, order_id)?;
        let base = match &req.scope {
            DiscountScope::Order => items
                .iter()
                .filter(|i| i.status != OrderItemStatus::Cancelled)
                .map(|i| {
                    money::to_decimal(i.unit_total()) * Decimal::from(i.quantity)
                })
                .sum::<Decimal>(),
            DiscountScope::Item { item_id } => {
                let item = items
                    .iter()
                    .find(|i| &i.id == item_id)
                    .ok_or_else(|| CoreError::not_found("order item", item_id))?;
                if item.status == OrderItemStatus::Cancelled {
                    return Err(CoreError::invalid_transition(
                        "order item",
                        item.status.as_str(),
                        "apply discount",
                    ));
                }
                money::to_decimal(item.unit_total()) * Decimal::from(item.quantity)
            }
        };
        let amount = match req.value {
            DiscountValue::Percentage(pct) => {
                money::to_f64(base * money::to_decimal(pct) / Decimal::ONE_HUNDRED)
            }
            DiscountValue::Flat(value) => money::to_f64(money::to_decimal(value)),
        };

        let discount = OrderDiscount {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            scope: req.scope,
            value: req.value,
            amount,
            label: req.label,
            applied_by: actor.id.clone(),
            cancelled: false,
            created_at: util::now_millis(),
        };
        self.storage.put_discount(&txn, &discount)?;
        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, amount, "discount applied");
        Ok(discount)
    }
}
