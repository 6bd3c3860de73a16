//! Order lifecycle manager.
//!
//! Owns the order and order-item state machines, enforces table-session
//! ownership and drives totals recomputation. Every public operation is one
//! unit of work: a single write transaction that commits or rolls back as a
//! whole, with side effects (prints, notifications) dispatched only after
//! the commit.

mod totals;

#[cfg(test)]
mod tests;

pub(crate) use totals::recalculate_totals;

use std::sync::Arc;

use redb::WriteTransaction;
use uuid::Uuid;

use shared::Actor;
use shared::event::{NotificationEvent, NotificationPayload};
use shared::models::{
    CancelKind, KotItemStatus, Order, OrderItem, OrderItemStatus, OrderStatus, OrderType,
    TableSession, TicketStatus,
};

use crate::config::OutletConfig;
use crate::effects::{EffectBus, SideEffect};
use crate::error::{CoreError, CoreResult};
use crate::pricing::{ItemSelection, MenuLookup};
use crate::printing::{CancelSlipPrint, PrintJob, PrintLine};
use crate::storage::CoreStorage;
use crate::util;

/// Load an order or fail with `NotFound`.
pub(crate) fn load_order(
    storage: &CoreStorage,
    txn: &WriteTransaction,
    order_id: &str,
) -> CoreResult<Order> {
    storage
        .get_order_txn(txn, order_id)?
        .ok_or_else(|| CoreError::not_found("order", order_id))
}

/// Session-ownership rule: a dine-in order may only be mutated by the user
/// who opened the table's session, unless the caller is privileged. The
/// error names the current owner so the caller can request a transfer.
pub(crate) fn ensure_can_modify(
    storage: &CoreStorage,
    txn: &WriteTransaction,
    order: &Order,
    actor: &Actor,
) -> CoreResult<()> {
    if actor.privileged || order.order_type != OrderType::DineIn {
        return Ok(());
    }
    let Some(session_id) = &order.session_id else {
        return Ok(());
    };
    let Some(session) = storage.get_session_txn(txn, session_id)? else {
        tracing::warn!(order_id = %order.id, session_id = %session_id, "order references missing session");
        return Ok(());
    };
    if session.opened_by != actor.id {
        return Err(CoreError::NotSessionOwner {
            owner_id: session.opened_by,
            owner_name: session.opened_by_name,
        });
    }
    Ok(())
}

/// Creation parameters for a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub table_id: Option<String>,
    pub packaging_charge: f64,
    pub delivery_charge: f64,
}

impl CreateOrderRequest {
    pub fn dine_in(table_id: impl Into<String>) -> Self {
        Self {
            order_type: OrderType::DineIn,
            table_id: Some(table_id.into()),
            packaging_charge: 0.0,
            delivery_charge: 0.0,
        }
    }

    pub fn takeaway() -> Self {
        Self {
            order_type: OrderType::Takeaway,
            table_id: None,
            packaging_charge: 0.0,
            delivery_charge: 0.0,
        }
    }

    pub fn delivery(delivery_charge: f64) -> Self {
        Self {
            order_type: OrderType::Delivery,
            table_id: None,
            packaging_charge: 0.0,
            delivery_charge,
        }
    }
}

/// Cancellation parameters for an item.
#[derive(Debug, Clone, Default)]
pub struct CancelItemRequest {
    /// `None` cancels the full line; `Some(q)` with `q < quantity` reduces it.
    pub quantity: Option<i32>,
    pub reason: Option<String>,
    /// Required once the item is already `PREPARING`/`READY`.
    pub approved_by: Option<Actor>,
}

impl CancelItemRequest {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn partial(quantity: i32) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    pub fn with_approval(mut self, approver: Actor) -> Self {
        self.approved_by = Some(approver);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Cancellation parameters for a whole order.
#[derive(Debug, Clone, Default)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
    pub approved_by: Option<Actor>,
}

pub struct OrderManager {
    storage: CoreStorage,
    config: Arc<OutletConfig>,
    menu: Arc<dyn MenuLookup>,
    effects: EffectBus,
}

impl OrderManager {
    pub fn new(
        storage: CoreStorage,
        config: Arc<OutletConfig>,
        menu: Arc<dyn MenuLookup>,
        effects: EffectBus,
    ) -> Self {
        Self {
            storage,
            config,
            menu,
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

    /// Create an order. Dine-in orders attach to the table's open session
    /// (after an ownership check) or open a new one; a table already
    /// carrying a live order is reported occupied.
    pub fn create_order(&self, actor: &Actor, req: CreateOrderRequest) -> CoreResult<Order> {
        let txn = self.storage.begin_write()?;
        let now = util::now_millis();
        let order_id = Uuid::new_v4().to_string();

        let mut session_id = None;
        if req.order_type == OrderType::DineIn
            && let Some(table_id) = &req.table_id
        {
            match self.storage.open_session_for_table_txn(&txn, table_id)? {
                Some(mut session) => {
                    if !actor.privileged && session.opened_by != actor.id {
                        return Err(CoreError::NotSessionOwner {
                            owner_id: session.opened_by,
                            owner_name: session.opened_by_name,
                        });
                    }
                    if let Some(existing_id) = &session.order_id
                        && let Some(existing) = self.storage.get_order_txn(&txn, existing_id)?
                        && !existing.status.is_terminal()
                    {
                        return Err(CoreError::TargetUnavailable(table_id.clone()));
                    }
                    session.order_id = Some(order_id.clone());
                    self.storage.put_session(&txn, &session)?;
                    session_id = Some(session.id);
                }
                None => {
                    let session = TableSession {
                        id: Uuid::new_v4().to_string(),
                        table_id: table_id.clone(),
                        outlet_id: self.config.outlet_id.clone(),
                        opened_by: actor.id.clone(),
                        opened_by_name: actor.name.clone(),
                        order_id: Some(order_id.clone()),
                        opened_at: now,
                        closed_at: None,
                    };
                    self.storage.put_session(&txn, &session)?;
                    session_id = Some(session.id);
                }
            }
        }

        let date = util::business_date(self.config.timezone);
        let seq = self.storage.next_sequence(
            &txn,
            &format!("order:{}:{}", self.config.outlet_id, date),
        )?;
        let order = Order {
            id: order_id,
            order_number: format!("{}{}-{:04}", self.config.order_prefix, date, seq),
            outlet_id: self.config.outlet_id.clone(),
            order_type: req.order_type,
            status: OrderStatus::Pending,
            table_id: req.table_id,
            session_id,
            subtotal: 0.0,
            discount_total: 0.0,
            taxable_amount: 0.0,
            tax_total: 0.0,
            service_charge: 0.0,
            packaging_charge: req.packaging_charge,
            delivery_charge: req.delivery_charge,
            round_off: 0.0,
            grand_total: 0.0,
            created_by: actor.id.clone(),
            created_by_name: actor.name.clone(),
            created_at: now,
            updated_at: now,
            cancel_reason: None,
        };
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, number = %order.order_number, "order created");
        self.effects.dispatch(vec![self.notify(NotificationPayload::OrderCreated {
            order_id: order.id.clone(),
        })]);
        Ok(order)
    }

    /// Add lines to an order. Prices and tax groups come from the menu
    /// oracle; totals are recomputed in the same transaction.
    pub fn add_items(
        &self,
        order_id: &str,
        actor: &Actor,
        selections: Vec<ItemSelection>,
    ) -> CoreResult<Vec<OrderItem>> {
        if selections.is_empty() {
            return Err(CoreError::InvalidOperation("no items requested".to_string()));
        }
        for selection in &selections {
            if selection.quantity <= 0 {
                return Err(CoreError::InvalidOperation(format!(
                    "quantity must be positive, got {}",
                    selection.quantity
                )));
            }
        }

        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "add items",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let now = util::now_millis();
        let mut created = Vec::with_capacity(selections.len());
        for selection in &selections {
            let priced = self.menu.price_line(selection)?;
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                menu_item_id: selection.menu_item_id.clone(),
                variant_id: selection.variant_id.clone(),
                name: priced.name,
                variant_name: priced.variant_name,
                quantity: selection.quantity,
                unit_price: priced.unit_price,
                addons: priced.addons,
                note: selection.note.clone(),
                station: priced.station,
                tax: priced.tax,
                line_total: 0.0,
                tax_amount: 0.0,
                status: OrderItemStatus::Pending,
                ticket_id: None,
                created_at: now,
            };
            self.storage.put_item(&txn, &item)?;
            created.push(item);
        }

        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, count = created.len(), "items added");
        self.effects
            .dispatch(vec![self.notify(NotificationPayload::OrderItemsAdded {
                order_id: order.id.clone(),
                item_ids: created.iter().map(|i| i.id.clone()).collect(),
            })]);
        Ok(created)
    }

    /// Change an item's quantity. Allowed only while the item is still
    /// `PENDING` — once a ticket exists the line must be cancelled and
    /// re-added instead.
    pub fn update_item_quantity(
        &self,
        order_id: &str,
        item_id: &str,
        quantity: i32,
        actor: &Actor,
    ) -> CoreResult<OrderItem> {
        if quantity <= 0 {
            return Err(CoreError::InvalidOperation(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "quantity change",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let mut item = self
            .storage
            .get_item_txn(&txn, order_id, item_id)?
            .ok_or_else(|| CoreError::not_found("order item", item_id))?;
        if item.status != OrderItemStatus::Pending {
            return Err(CoreError::invalid_transition(
                "order item",
                item.status.as_str(),
                "quantity change",
            ));
        }

        item.quantity = quantity;
        self.storage.put_item(&txn, &item)?;
        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;
        Ok(item)
    }

    /// Cancel an item, fully or partially.
    ///
    /// A still-pending line is a pure item update. A ticketed line also
    /// cancels (or shrinks) the matching KOT item, may auto-cancel a now
    /// empty ticket, and addresses a cancel slip to that item's station.
    pub fn cancel_item(
        &self,
        order_id: &str,
        item_id: &str,
        actor: &Actor,
        req: CancelItemRequest,
    ) -> CoreResult<OrderItem> {
        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "cancel item",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let mut item = self
            .storage
            .get_item_txn(&txn, order_id, item_id)?
            .ok_or_else(|| CoreError::not_found("order item", item_id))?;
        if item.status == OrderItemStatus::Cancelled {
            return Err(CoreError::invalid_transition(
                "order item",
                item.status.as_str(),
                "cancel",
            ));
        }
        if matches!(
            item.status,
            OrderItemStatus::Preparing | OrderItemStatus::Ready
        ) && req.approved_by.is_none()
        {
            return Err(CoreError::ApprovalRequired {
                status: item.status.as_str().to_string(),
            });
        }

        let cancelled_qty = match req.quantity {
            Some(q) if q <= 0 => {
                return Err(CoreError::InvalidOperation(format!(
                    "cancel quantity must be positive, got {}",
                    q
                )));
            }
            Some(q) if q < item.quantity => q,
            _ => item.quantity,
        };
        let kind = if cancelled_qty < item.quantity {
            CancelKind::PartialItem
        } else {
            CancelKind::FullItem
        };

        match kind {
            CancelKind::PartialItem => item.quantity -= cancelled_qty,
            CancelKind::FullItem => item.status = OrderItemStatus::Cancelled,
        }
        self.storage.put_item(&txn, &item)?;

        let mut effects = Vec::new();
        if let Some(ticket_id) = item.ticket_id.clone() {
            let mut ticket = self
                .storage
                .get_ticket_txn(&txn, &ticket_id)?
                .ok_or_else(|| CoreError::not_found("ticket", &ticket_id))?;
            let mut slip_lines = Vec::new();
            for kot_item in ticket.items.iter_mut() {
                if kot_item.order_item_id != item.id {
                    continue;
                }
                match kind {
                    CancelKind::PartialItem => kot_item.quantity = item.quantity,
                    CancelKind::FullItem => kot_item.status = KotItemStatus::Cancelled,
                }
                slip_lines.push(PrintLine {
                    name: kot_item.name.clone(),
                    variant_name: kot_item.variant_name.clone(),
                    quantity: cancelled_qty,
                    instructions: kot_item.instructions.clone(),
                });
            }
            if ticket.all_items_cancelled() && !ticket.status.is_terminal() {
                ticket.status = TicketStatus::Cancelled;
                effects.push(self.notify(NotificationPayload::KotCancelled {
                    ticket_id: ticket.id.clone(),
                }));
            }
            self.storage.put_ticket(&txn, &ticket)?;
            effects.push(SideEffect::Print(PrintJob::CancelSlip(CancelSlipPrint {
                station: ticket.station.clone(),
                ticket_number: ticket.ticket_number.clone(),
                order_number: order.order_number.clone(),
                items: slip_lines,
                reason: req.reason.clone(),
                timestamp: util::now_millis(),
            })));
        }

        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            item_id = %item.id,
            kind = ?kind,
            quantity = cancelled_qty,
            "item cancelled"
        );
        effects.push(self.notify(NotificationPayload::OrderItemCancelled {
            order_id: order.id.clone(),
            item_id: item.id.clone(),
            kind,
        }));
        self.effects.dispatch(effects);
        Ok(item)
    }

    /// Cancel an order: all items, all KOT items, all open tickets and any
    /// unpaid invoice flip to cancelled and the table session is released,
    /// in that order, inside one transaction.
    pub fn cancel_order(
        &self,
        order_id: &str,
        actor: &Actor,
        req: CancelOrderRequest,
    ) -> CoreResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.is_cancellable() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "cancel",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let mut items = self.storage.items_for_order_txn(&txn, order_id)?;
        let has_prepared_work = matches!(order.status, OrderStatus::Preparing | OrderStatus::Ready)
            || items.iter().any(|i| {
                matches!(
                    i.status,
                    OrderItemStatus::Preparing | OrderItemStatus::Ready
                )
            });
        if has_prepared_work && req.approved_by.is_none() {
            return Err(CoreError::ApprovalRequired {
                status: order.status.as_str().to_string(),
            });
        }

        // 1. Items.
        for item in items.iter_mut() {
            if item.status != OrderItemStatus::Cancelled {
                item.status = OrderItemStatus::Cancelled;
                self.storage.put_item(&txn, item)?;
            }
        }

        // 2. KOT items and tickets.
        let mut effects = Vec::new();
        let tickets = self.storage.tickets_for_order_txn(&txn, order_id)?;
        for mut ticket in tickets {
            if ticket.status.is_terminal() {
                continue;
            }
            let mut slip_lines = Vec::new();
            for kot_item in ticket.items.iter_mut() {
                if kot_item.status != KotItemStatus::Cancelled {
                    kot_item.status = KotItemStatus::Cancelled;
                    slip_lines.push(PrintLine {
                        name: kot_item.name.clone(),
                        variant_name: kot_item.variant_name.clone(),
                        quantity: kot_item.quantity,
                        instructions: kot_item.instructions.clone(),
                    });
                }
            }
            ticket.status = TicketStatus::Cancelled;
            self.storage.put_ticket(&txn, &ticket)?;
            effects.push(self.notify(NotificationPayload::KotCancelled {
                ticket_id: ticket.id.clone(),
            }));
            if !slip_lines.is_empty() {
                effects.push(SideEffect::Print(PrintJob::CancelSlip(CancelSlipPrint {
                    station: ticket.station.clone(),
                    ticket_number: ticket.ticket_number.clone(),
                    order_number: order.order_number.clone(),
                    items: slip_lines,
                    reason: req.reason.clone(),
                    timestamp: util::now_millis(),
                })));
            }
        }

        // 3. Unpaid invoices.
        let invoices = self.storage.invoices_for_order_txn(&txn, order_id)?;
        for mut invoice in invoices {
            if invoice.status == shared::models::InvoiceStatus::Unpaid {
                invoice.status = shared::models::InvoiceStatus::Cancelled;
                invoice.cancelled_at = Some(util::now_millis());
                self.storage.put_invoice(&txn, &invoice)?;
                effects.push(self.notify(NotificationPayload::BillStatus {
                    order_id: order.id.clone(),
                    invoice_id: invoice.id.clone(),
                    status: invoice.status,
                }));
            }
        }

        // 4. Release the table.
        if let Some(session_id) = &order.session_id
            && let Some(mut session) = self.storage.get_session_txn(&txn, session_id)?
            && session.is_open()
        {
            session.closed_at = Some(util::now_millis());
            self.storage.put_session(&txn, &session)?;
        }

        order.status = OrderStatus::Cancelled;
        order.cancel_reason = req.reason;
        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, "order cancelled");
        effects.push(self.notify(NotificationPayload::OrderCancelled {
            order_id: order.id.clone(),
        }));
        self.effects.dispatch(effects);
        Ok(order)
    }

    /// Move an order to a different table. The destination must not be
    /// carrying a live order; session ownership travels with the order.
    pub fn transfer_table(
        &self,
        order_id: &str,
        to_table_id: &str,
        actor: &Actor,
    ) -> CoreResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if order.order_type != OrderType::DineIn {
            return Err(CoreError::InvalidOperation(
                "only dine-in orders can change table".to_string(),
            ));
        }
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "table transfer",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        if let Some(dest) = self.storage.open_session_for_table_txn(&txn, to_table_id)? {
            let occupied = match &dest.order_id {
                Some(existing_id) => self
                    .storage
                    .get_order_txn(&txn, existing_id)?
                    .is_some_and(|o| !o.status.is_terminal()),
                None => false,
            };
            if occupied {
                return Err(CoreError::TargetUnavailable(to_table_id.to_string()));
            }
            // Stale session with no live order: close it out of the way.
            let mut stale = dest;
            stale.closed_at = Some(util::now_millis());
            self.storage.put_session(&txn, &stale)?;
        }

        let now = util::now_millis();
        let from_table = order.table_id.clone();
        let mut owner = (actor.id.clone(), actor.name.clone());
        if let Some(session_id) = &order.session_id
            && let Some(mut session) = self.storage.get_session_txn(&txn, session_id)?
        {
            owner = (session.opened_by.clone(), session.opened_by_name.clone());
            if session.is_open() {
                session.closed_at = Some(now);
                self.storage.put_session(&txn, &session)?;
            }
        }

        let new_session = TableSession {
            id: Uuid::new_v4().to_string(),
            table_id: to_table_id.to_string(),
            outlet_id: self.config.outlet_id.clone(),
            opened_by: owner.0,
            opened_by_name: owner.1,
            order_id: Some(order.id.clone()),
            opened_at: now,
            closed_at: None,
        };
        self.storage.put_session(&txn, &new_session)?;

        order.table_id = Some(to_table_id.to_string());
        order.session_id = Some(new_session.id);
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            from = ?from_table,
            to = %to_table_id,
            "order transferred"
        );
        Ok(order)
    }
}
