//! Ticket (KOT/BOT) lifecycle manager.
//!
//! Creates station-scoped tickets from pending items and advances the
//! ticket/item state machines:
//! `PENDING → ACCEPTED → PREPARING → READY → SERVED`, `CANCELLED` from any
//! non-terminal state. A ticket auto-advances to `READY` when every
//! non-cancelled item is done and is force-cancelled when every item
//! cancels. Serving propagates the order's all-items-served check.


use std::sync::Arc;

use redb::WriteTransaction;
use uuid::Uuid;

use shared::Actor;
use shared::event::{NotificationEvent, NotificationPayload};
use shared::models::{
    KotItem, KotItemStatus, KotTicket, Order, OrderItemStatus, OrderStatus, TicketStatus,
};

use crate::config::OutletConfig;
use crate::effects::{EffectBus, SideEffect};
use crate::error::{CoreError, CoreResult};
use crate::orders::{ensure_can_modify, load_order, recalculate_totals};
use crate::printing::{CancelSlipPrint, PrintJob, PrintLine, TicketPrint};
use crate::routing;
use crate::storage::CoreStorage;
use crate::util;

pub struct TicketManager {
    storage: CoreStorage,
    config: Arc<OutletConfig>,
    effects: EffectBus,
}

impl TicketManager {
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

    fn load_ticket(&self, txn: &WriteTransaction, ticket_id: &str) -> CoreResult<KotTicket> {
        self.storage
            .get_ticket_txn(txn, ticket_id)?
            .ok_or_else(|| CoreError::not_found("ticket", ticket_id))
    }

    fn ticket_print(&self, ticket: &KotTicket, order: &Order, reprint: bool) -> PrintJob {
        PrintJob::Ticket(TicketPrint {
            station: ticket.station.clone(),
            ticket_number: ticket.ticket_number.clone(),
            order_number: order.order_number.clone(),
            table_id: order.table_id.clone(),
            priority: ticket.priority,
            items: ticket
                .items
                .iter()
                .filter(|i| i.status != KotItemStatus::Cancelled)
                .map(|i| PrintLine {
                    name: i.name.clone(),
                    variant_name: i.variant_name.clone(),
                    quantity: i.quantity,
                    instructions: i.instructions.clone(),
                })
                .collect(),
            reprint,
            timestamp: util::now_millis(),
        })
    }

    /// Lock in the current pending items and cut one ticket per station.
    ///
    /// Consumed items flip to `SENT_TO_KITCHEN`; each ticket gets a
    /// per-station per-day zero-padded number. After the commit, each
    /// station is notified and a ticket print is enqueued.
    pub fn create_tickets(
        &self,
        order_id: &str,
        actor: &Actor,
        priority: bool,
    ) -> CoreResult<Vec<KotTicket>> {
        let txn = self.storage.begin_write()?;
        let mut order = load_order(&self.storage, &txn, order_id)?;
        if !order.status.accepts_item_changes() {
            return Err(CoreError::invalid_transition(
                "order",
                order.status.as_str(),
                "send to kitchen",
            ));
        }
        ensure_can_modify(&self.storage, &txn, &order, actor)?;

        let items = self.storage.items_for_order_txn(&txn, order_id)?;
        let pending: Vec<_> = items
            .into_iter()
            .filter(|i| i.status == OrderItemStatus::Pending)
            .collect();
        if pending.is_empty() {
            return Err(CoreError::NoPendingItems);
        }

        let now = util::now_millis();
        let date = util::business_date(self.config.timezone);
        let mut tickets = Vec::new();

        for group in routing::group_by_station(pending) {
            let seq = self
                .storage
                .next_sequence(&txn, &format!("kot:{}:{}", group.station.id, date))?;
            let ticket_number = format!(
                "{}{}-{:03}",
                group.station.kind.ticket_prefix(),
                date,
                seq
            );

            let ticket_id = Uuid::new_v4().to_string();
            let mut kot_items = Vec::with_capacity(group.items.len());
            for mut item in group.items {
                kot_items.push(KotItem {
                    id: Uuid::new_v4().to_string(),
                    order_item_id: item.id.clone(),
                    name: item.name.clone(),
                    variant_name: item.variant_name.clone(),
                    quantity: item.quantity,
                    instructions: item.note.clone(),
                    status: KotItemStatus::Pending,
                });
                item.status = OrderItemStatus::SentToKitchen;
                item.ticket_id = Some(ticket_id.clone());
                self.storage.put_item(&txn, &item)?;
            }

            let ticket = KotTicket {
                id: ticket_id,
                ticket_number,
                order_id: order.id.clone(),
                outlet_id: self.config.outlet_id.clone(),
                station: group.station,
                status: TicketStatus::Pending,
                priority,
                items: kot_items,
                created_at: now,
                accepted_at: None,
                ready_at: None,
                served_at: None,
            };
            self.storage.put_ticket(&txn, &ticket)?;
            tickets.push(ticket);
        }

        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Confirmed;
        }
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(order_id = %order.id, tickets = tickets.len(), "tickets created");
        let mut effects = Vec::new();
        for ticket in &tickets {
            effects.push(self.notify(NotificationPayload::KotCreated {
                ticket_id: ticket.id.clone(),
                station_id: ticket.station.id.clone(),
            }));
            effects.push(SideEffect::Print(self.ticket_print(ticket, &order, false)));
        }
        effects.push(self.notify(NotificationPayload::OrderKotSent {
            order_id: order.id.clone(),
            ticket_ids: tickets.iter().map(|t| t.id.clone()).collect(),
        }));
        self.effects.dispatch(effects);
        Ok(tickets)
    }

    /// Station acknowledges the ticket.
    pub fn accept_ticket(&self, ticket_id: &str) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if ticket.status != TicketStatus::Pending {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "accept",
            ));
        }
        ticket.status = TicketStatus::Accepted;
        ticket.accepted_at = Some(util::now_millis());
        self.storage.put_ticket(&txn, &ticket)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.effects
            .dispatch(vec![self.notify(NotificationPayload::KotAccepted {
                ticket_id: ticket.id.clone(),
            })]);
        Ok(ticket)
    }

    /// Station starts preparing; items and the order follow.
    pub fn start_preparing(&self, ticket_id: &str) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if ticket.status != TicketStatus::Accepted {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "start preparing",
            ));
        }
        ticket.status = TicketStatus::Preparing;
        for kot_item in ticket.items.iter_mut() {
            if kot_item.status == KotItemStatus::Pending {
                kot_item.status = KotItemStatus::Preparing;
            }
        }
        self.storage.put_ticket(&txn, &ticket)?;
        self.mirror_item_status(&txn, &ticket, OrderItemStatus::Preparing)?;

        let mut order = load_order(&self.storage, &txn, &ticket.order_id)?;
        if matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            order.status = OrderStatus::Preparing;
            order.updated_at = util::now_millis();
            self.storage.put_order(&txn, &order)?;
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.effects
            .dispatch(vec![self.notify(NotificationPayload::KotPreparing {
                ticket_id: ticket.id.clone(),
            })]);
        Ok(ticket)
    }

    /// Mark one KOT item ready; the ticket auto-closes to `READY` when this
    /// was the last open item.
    pub fn mark_item_ready(&self, ticket_id: &str, kot_item_id: &str) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if !matches!(
            ticket.status,
            TicketStatus::Pending | TicketStatus::Accepted | TicketStatus::Preparing
        ) {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "mark item ready",
            ));
        }

        let mut order_item_id = None;
        for kot_item in ticket.items.iter_mut() {
            if kot_item.id != kot_item_id {
                continue;
            }
            if matches!(
                kot_item.status,
                KotItemStatus::Cancelled | KotItemStatus::Served
            ) {
                return Err(CoreError::invalid_transition(
                    "ticket item",
                    format!("{:?}", kot_item.status).to_uppercase(),
                    "mark ready",
                ));
            }
            kot_item.status = KotItemStatus::Ready;
            order_item_id = Some(kot_item.order_item_id.clone());
        }
        let order_item_id =
            order_item_id.ok_or_else(|| CoreError::not_found("ticket item", kot_item_id))?;

        let mut effects = Vec::new();
        if ticket.all_items_done() {
            ticket.status = TicketStatus::Ready;
            ticket.ready_at = Some(util::now_millis());
            effects.push(self.notify(NotificationPayload::KotReady {
                ticket_id: ticket.id.clone(),
            }));
        }
        self.storage.put_ticket(&txn, &ticket)?;

        if let Some(mut item) = self
            .storage
            .get_item_txn(&txn, &ticket.order_id, &order_item_id)?
            && item.status != OrderItemStatus::Cancelled
        {
            item.status = OrderItemStatus::Ready;
            self.storage.put_item(&txn, &item)?;
        }
        self.check_order_ready(&txn, &ticket.order_id)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.effects.dispatch(effects);
        Ok(ticket)
    }

    /// Mark the whole ticket ready.
    pub fn mark_ticket_ready(&self, ticket_id: &str) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if !matches!(
            ticket.status,
            TicketStatus::Accepted | TicketStatus::Preparing
        ) {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "mark ready",
            ));
        }
        ticket.status = TicketStatus::Ready;
        ticket.ready_at = Some(util::now_millis());
        for kot_item in ticket.items.iter_mut() {
            if matches!(
                kot_item.status,
                KotItemStatus::Pending | KotItemStatus::Preparing
            ) {
                kot_item.status = KotItemStatus::Ready;
            }
        }
        self.storage.put_ticket(&txn, &ticket)?;
        self.mirror_item_status(&txn, &ticket, OrderItemStatus::Ready)?;
        self.check_order_ready(&txn, &ticket.order_id)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.effects
            .dispatch(vec![self.notify(NotificationPayload::KotReady {
                ticket_id: ticket.id.clone(),
            })]);
        Ok(ticket)
    }

    /// Mark a ready ticket served and run the order's all-served check.
    pub fn mark_served(&self, ticket_id: &str) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if ticket.status != TicketStatus::Ready {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "serve",
            ));
        }
        ticket.status = TicketStatus::Served;
        ticket.served_at = Some(util::now_millis());
        for kot_item in ticket.items.iter_mut() {
            if kot_item.status == KotItemStatus::Ready {
                kot_item.status = KotItemStatus::Served;
            }
        }
        self.storage.put_ticket(&txn, &ticket)?;
        self.mirror_item_status(&txn, &ticket, OrderItemStatus::Served)?;

        // All items served may advance the order itself.
        let mut order = load_order(&self.storage, &txn, &ticket.order_id)?;
        let items = self.storage.items_for_order_txn(&txn, &ticket.order_id)?;
        let live: Vec<_> = items
            .iter()
            .filter(|i| i.status != OrderItemStatus::Cancelled)
            .collect();
        let all_served = !live.is_empty() && live.iter().all(|i| i.status == OrderItemStatus::Served);
        if all_served
            && matches!(
                order.status,
                OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready
            )
        {
            order.status = OrderStatus::Served;
            order.updated_at = util::now_millis();
            self.storage.put_order(&txn, &order)?;
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.effects
            .dispatch(vec![self.notify(NotificationPayload::KotServed {
                ticket_id: ticket.id.clone(),
            })]);
        Ok(ticket)
    }

    /// Cancel a whole ticket: its items and the backing order items cancel
    /// with it, totals are recomputed and a cancel slip goes to the station.
    pub fn cancel_ticket(
        &self,
        ticket_id: &str,
        approved_by: Option<&Actor>,
        reason: Option<String>,
    ) -> CoreResult<KotTicket> {
        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_ticket(&txn, ticket_id)?;
        if ticket.status.is_terminal() {
            return Err(CoreError::invalid_transition(
                "ticket",
                ticket.status.as_str(),
                "cancel",
            ));
        }
        if matches!(
            ticket.status,
            TicketStatus::Preparing | TicketStatus::Ready
        ) && approved_by.is_none()
        {
            return Err(CoreError::ApprovalRequired {
                status: ticket.status.as_str().to_string(),
            });
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
        self.mirror_item_status(&txn, &ticket, OrderItemStatus::Cancelled)?;

        let mut order = load_order(&self.storage, &txn, &ticket.order_id)?;
        recalculate_totals(&self.storage, &txn, &self.config, &mut order)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(ticket_id = %ticket.id, "ticket cancelled");
        self.effects.dispatch(vec![
            self.notify(NotificationPayload::KotCancelled {
                ticket_id: ticket.id.clone(),
            }),
            SideEffect::Print(PrintJob::CancelSlip(CancelSlipPrint {
                station: ticket.station.clone(),
                ticket_number: ticket.ticket_number.clone(),
                order_number: order.order_number.clone(),
                items: slip_lines,
                reason,
                timestamp: util::now_millis(),
            })),
        ]);
        Ok(ticket)
    }

    /// Re-enqueue the ticket print (paper jam, lost slip).
    pub fn reprint_ticket(&self, ticket_id: &str) -> CoreResult<()> {
        let ticket = self
            .storage
            .get_ticket(ticket_id)?
            .ok_or_else(|| CoreError::not_found("ticket", ticket_id))?;
        let order = self
            .storage
            .get_order(&ticket.order_id)?
            .ok_or_else(|| CoreError::not_found("order", &ticket.order_id))?;
        self.effects
            .dispatch(vec![SideEffect::Print(self.ticket_print(&ticket, &order, true))]);
        Ok(())
    }

    /// Open tickets for a station's display, priority first.
    pub fn station_queue(&self, station_id: &str) -> CoreResult<Vec<KotTicket>> {
        let mut open: Vec<KotTicket> = self
            .storage
            .all_tickets()?
            .into_iter()
            .filter(|t| {
                t.station.id == station_id
                    && matches!(
                        t.status,
                        TicketStatus::Pending | TicketStatus::Accepted | TicketStatus::Preparing
                    )
            })
            .collect();
        open.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(open)
    }

    /// Push a ticket transition down onto the backing order items.
    ///
    /// Each order item follows its own kot item, not the ticket as a whole:
    /// a kot item that did not move in this transition (already served, or
    /// cancelled earlier) must not be dragged along.
    fn mirror_item_status(
        &self,
        txn: &WriteTransaction,
        ticket: &KotTicket,
        status: OrderItemStatus,
    ) -> CoreResult<()> {
        let moved = match status {
            OrderItemStatus::Preparing => KotItemStatus::Preparing,
            OrderItemStatus::Ready => KotItemStatus::Ready,
            OrderItemStatus::Served => KotItemStatus::Served,
            OrderItemStatus::Cancelled => KotItemStatus::Cancelled,
            OrderItemStatus::Pending | OrderItemStatus::SentToKitchen => return Ok(()),
        };
        for kot_item in &ticket.items {
            if kot_item.status != moved {
                continue;
            }
            let Some(mut item) =
                self.storage
                    .get_item_txn(txn, &ticket.order_id, &kot_item.order_item_id)?
            else {
                continue;
            };
            if item.status == OrderItemStatus::Cancelled && status != OrderItemStatus::Cancelled {
                continue;
            }
            if item.status != status {
                item.status = status;
                self.storage.put_item(txn, &item)?;
            }
        }
        Ok(())
    }

    /// Advance the order to `READY` when every live item is done.
    fn check_order_ready(&self, txn: &WriteTransaction, order_id: &str) -> CoreResult<()> {
        let mut order = load_order(&self.storage, txn, order_id)?;
        if !matches!(
            order.status,
            OrderStatus::Confirmed | OrderStatus::Preparing
        ) {
            return Ok(());
        }
        let items = self.storage.items_for_order_txn(txn, order_id)?;
        let live: Vec<_> = items
            .iter()
            .filter(|i| i.status != OrderItemStatus::Cancelled)
            .collect();
        let all_ready = !live.is_empty()
            && live.iter().all(|i| {
                matches!(
                    i.status,
                    OrderItemStatus::Ready | OrderItemStatus::Served
                )
            });
        if all_ready {
            order.status = OrderStatus::Ready;
            order.updated_at = util::now_millis();
            self.storage.put_order(txn, &order)?;
        }
        Ok(())
    }
}
