//! Engine facade.
//!
//! Wires the storage handle, outlet config and menu oracle into the three
//! managers sharing one effect bus, and exposes the read-side queries.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use shared::event::NotificationEvent;
use shared::models::{Invoice, KotTicket, Order, OrderDiscount, OrderItem};

use crate::billing::BillingManager;
use crate::config::OutletConfig;
use crate::effects::EffectBus;
use crate::error::{CoreError, CoreResult};
use crate::orders::OrderManager;
use crate::pricing::MenuLookup;
use crate::printing::PrintJob;
use crate::storage::CoreStorage;
use crate::tickets::TicketManager;

/// Full read model for one order.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub discounts: Vec<OrderDiscount>,
    pub tickets: Vec<KotTicket>,
    pub invoices: Vec<Invoice>,
}

pub struct Engine {
    storage: CoreStorage,
    effects: EffectBus,
    pub orders: OrderManager,
    pub tickets: TicketManager,
    pub billing: BillingManager,
}

impl Engine {
    /// Open (or create) the engine database at `path`.
    ///
    /// Returns the engine and the print-job receiver to feed into
    /// [`crate::printing::run_print_worker`].
    pub fn open(
        path: impl AsRef<Path>,
        config: OutletConfig,
        menu: Arc<dyn MenuLookup>,
    ) -> CoreResult<(Self, mpsc::Receiver<PrintJob>)> {
        let storage = CoreStorage::open(path)?;
        Ok(Self::build(storage, config, menu))
    }

    /// Ephemeral engine backed by an in-memory store.
    pub fn in_memory(
        config: OutletConfig,
        menu: Arc<dyn MenuLookup>,
    ) -> CoreResult<(Self, mpsc::Receiver<PrintJob>)> {
        let storage = CoreStorage::open_in_memory()?;
        Ok(Self::build(storage, config, menu))
    }

    fn build(
        storage: CoreStorage,
        config: OutletConfig,
        menu: Arc<dyn MenuLookup>,
    ) -> (Self, mpsc::Receiver<PrintJob>) {
        let config = Arc::new(config);
        let (effects, print_rx) = EffectBus::new();
        let orders = OrderManager::new(
            storage.clone(),
            config.clone(),
            menu,
            effects.clone(),
        );
        let tickets = TicketManager::new(storage.clone(), config.clone(), effects.clone());
        let billing = BillingManager::new(storage.clone(), config, effects.clone());
        (
            Self {
                storage,
                effects,
                orders,
                tickets,
                billing,
            },
            print_rx,
        )
    }

    /// Subscribe to post-commit notification events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.effects.subscribe()
    }

    pub fn storage(&self) -> &CoreStorage {
        &self.storage
    }

    /// Assemble the full read model for an order.
    pub fn order_detail(&self, order_id: &str) -> CoreResult<OrderDetail> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| CoreError::not_found("order", order_id))?;
        Ok(OrderDetail {
            items: self.storage.items_for_order(order_id)?,
            discounts: self.storage.discounts_for_order(order_id)?,
            tickets: self.storage.tickets_for_order(order_id)?,
            invoices: self.storage.invoices_for_order(order_id)?,
            order,
        })
    }

    /// All non-terminal orders.
    pub fn active_orders(&self) -> CoreResult<Vec<Order>> {
        let mut orders = Vec::new();
        for id in self.storage.active_order_ids()? {
            if let Some(order) = self.storage.get_order(&id)? {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}
