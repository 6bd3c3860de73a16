//! redb-backed storage for the order/ticket/invoice graph.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order rows |
//! | `order_items` | `(order_id, item_id)` | `OrderItem` | Items, range-scanned per order |
//! | `sessions` | `session_id` | `TableSession` | Table sessions |
//! | `open_sessions` | `table_id` | `session_id` | At-most-one open session per table |
//! | `tickets` | `ticket_id` | `KotTicket` | Tickets with embedded items |
//! | `order_tickets` | `(order_id, ticket_id)` | `()` | Ticket index per order |
//! | `invoices` | `invoice_id` | `Invoice` | Invoices |
//! | `order_invoices` | `(order_id, invoice_id)` | `()` | Invoice index per order |
//! | `discounts` | `(order_id, discount_id)` | `OrderDiscount` | Discounts per order |
//! | `counters` | `scope` | `u64` | Day/year-scoped sequence counters |
//! | `active_orders` | `order_id` | `()` | Active order index |
//!
//! # Unit of work
//!
//! Every externally-triggered operation runs inside one `WriteTransaction`:
//! it observes a consistent snapshot, performs all cross-entity writes, and
//! commits or is dropped (rolled back) as a whole. redb serializes writers,
//! so concurrent operations on the same order line up at this layer;
//! ownership checks are business rules on top of it, not a substitute.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use shared::models::{Invoice, KotTicket, Order, OrderDiscount, OrderItem, TableSession};

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const ITEMS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("order_items");
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const OPEN_SESSIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("open_sessions");
const TICKETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");
const ORDER_TICKETS_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("order_tickets");
const INVOICES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("invoices");
const ORDER_INVOICES_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("order_invoices");
const DISCOUNTS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("discounts");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");
const ACTIVE_ORDERS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("active_orders");

/// Upper bound for composite-key prefix scans. Entity ids are UUID strings,
/// which always sort below this code point.
const KEY_MAX: &str = "\u{10FFFF}";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Storage handle over the shared entity graph.
///
/// Cheap to clone; passed into every manager constructor.
#[derive(Clone)]
pub struct CoreStorage {
    db: Arc<Database>,
}

impl CoreStorage {
    /// Open or create the database at the given path.
    ///
    /// redb commits with immediate durability: once `commit()` returns the
    /// state change survives power loss, and the file is always consistent.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(ORDERS_TABLE)?;
            let _ = txn.open_table(ITEMS_TABLE)?;
            let _ = txn.open_table(SESSIONS_TABLE)?;
            let _ = txn.open_table(OPEN_SESSIONS_TABLE)?;
            let _ = txn.open_table(TICKETS_TABLE)?;
            let _ = txn.open_table(ORDER_TICKETS_TABLE)?;
            let _ = txn.open_table(INVOICES_TABLE)?;
            let _ = txn.open_table(ORDER_INVOICES_TABLE)?;
            let _ = txn.open_table(DISCOUNTS_TABLE)?;
            let _ = txn.open_table(COUNTERS_TABLE)?;
            let _ = txn.open_table(ACTIVE_ORDERS_TABLE)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction (one unit of work).
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Counters ==========

    /// Increment and return the counter for a scope key (e.g.
    /// `"kot:bar-1:20250807"`). Runs inside the caller's transaction so a
    /// rolled-back operation does not burn a number.
    pub fn next_sequence(&self, txn: &WriteTransaction, scope: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let current = table.get(scope)?.map(|g| g.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(scope, next)?;
        Ok(next)
    }

    // ========== Orders ==========

    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let bytes = encode(order)?;
        let mut table = txn.open_table(ORDERS_TABLE)?;
        table.insert(order.id.as_str(), bytes.as_slice())?;

        let mut active = txn.open_table(ACTIVE_ORDERS_TABLE)?;
        if order.status.is_terminal() {
            active.remove(order.id.as_str())?;
        } else {
            active.insert(order.id.as_str(), ())?;
        }
        Ok(())
    }

    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        table
            .get(order_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        table
            .get(order_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    /// Ids of all non-terminal orders.
    pub fn active_order_ids(&self) -> StorageResult<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ACTIVE_ORDERS_TABLE)?;
        let mut ids = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            ids.push(key.value().to_string());
        }
        Ok(ids)
    }

    // ========== Order items ==========

    pub fn put_item(&self, txn: &WriteTransaction, item: &OrderItem) -> StorageResult<()> {
        let bytes = encode(item)?;
        let mut table = txn.open_table(ITEMS_TABLE)?;
        table.insert((item.order_id.as_str(), item.id.as_str()), bytes.as_slice())?;
        Ok(())
    }

    pub fn get_item_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        item_id: &str,
    ) -> StorageResult<Option<OrderItem>> {
        let table = txn.open_table(ITEMS_TABLE)?;
        table
            .get((order_id, item_id))?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn items_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<OrderItem>> {
        let table = txn.open_table(ITEMS_TABLE)?;
        let mut items = Vec::new();
        for entry in table.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (_, value) = entry?;
            items.push(decode(value.value())?);
        }
        items.sort_by(|a: &OrderItem, b: &OrderItem| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    pub fn items_for_order(&self, order_id: &str) -> StorageResult<Vec<OrderItem>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ITEMS_TABLE)?;
        let mut items = Vec::new();
        for entry in table.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (_, value) = entry?;
            items.push(decode(value.value())?);
        }
        items.sort_by(|a: &OrderItem, b: &OrderItem| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    // ========== Table sessions ==========

    /// Persist a session and maintain the one-open-session-per-table index.
    pub fn put_session(&self, txn: &WriteTransaction, session: &TableSession) -> StorageResult<()> {
        let bytes = encode(session)?;
        let mut table = txn.open_table(SESSIONS_TABLE)?;
        table.insert(session.id.as_str(), bytes.as_slice())?;

        let mut open = txn.open_table(OPEN_SESSIONS_TABLE)?;
        if session.is_open() {
            open.insert(session.table_id.as_str(), session.id.as_str())?;
        } else {
            let stale = open
                .get(session.table_id.as_str())?
                .map(|g| g.value().to_string());
            if stale.as_deref() == Some(session.id.as_str()) {
                open.remove(session.table_id.as_str())?;
            }
        }
        Ok(())
    }

    pub fn get_session_txn(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
    ) -> StorageResult<Option<TableSession>> {
        let table = txn.open_table(SESSIONS_TABLE)?;
        table
            .get(session_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn open_session_for_table_txn(
        &self,
        txn: &WriteTransaction,
        table_id: &str,
    ) -> StorageResult<Option<TableSession>> {
        let open = txn.open_table(OPEN_SESSIONS_TABLE)?;
        let Some(session_id) = open.get(table_id)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };
        self.get_session_txn(txn, &session_id)
    }

    pub fn open_session_for_table(&self, table_id: &str) -> StorageResult<Option<TableSession>> {
        let txn = self.db.begin_read()?;
        let open = txn.open_table(OPEN_SESSIONS_TABLE)?;
        let Some(session_id) = open.get(table_id)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };
        let table = txn.open_table(SESSIONS_TABLE)?;
        table
            .get(session_id.as_str())?
            .map(|g| decode(g.value()))
            .transpose()
    }

    // ========== Tickets ==========

    pub fn put_ticket(&self, txn: &WriteTransaction, ticket: &KotTicket) -> StorageResult<()> {
        let bytes = encode(ticket)?;
        let mut table = txn.open_table(TICKETS_TABLE)?;
        table.insert(ticket.id.as_str(), bytes.as_slice())?;
        let mut index = txn.open_table(ORDER_TICKETS_TABLE)?;
        index.insert((ticket.order_id.as_str(), ticket.id.as_str()), ())?;
        Ok(())
    }

    pub fn get_ticket_txn(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
    ) -> StorageResult<Option<KotTicket>> {
        let table = txn.open_table(TICKETS_TABLE)?;
        table
            .get(ticket_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn get_ticket(&self, ticket_id: &str) -> StorageResult<Option<KotTicket>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TICKETS_TABLE)?;
        table
            .get(ticket_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn tickets_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<KotTicket>> {
        let index = txn.open_table(ORDER_TICKETS_TABLE)?;
        let mut ids = Vec::new();
        for entry in index.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (key, _) = entry?;
            ids.push(key.value().1.to_string());
        }
        let table = txn.open_table(TICKETS_TABLE)?;
        let mut tickets = Vec::new();
        for id in ids {
            if let Some(guard) = table.get(id.as_str())? {
                tickets.push(decode(guard.value())?);
            }
        }
        tickets.sort_by(|a: &KotTicket, b: &KotTicket| a.created_at.cmp(&b.created_at));
        Ok(tickets)
    }

    pub fn tickets_for_order(&self, order_id: &str) -> StorageResult<Vec<KotTicket>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(ORDER_TICKETS_TABLE)?;
        let mut ids = Vec::new();
        for entry in index.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (key, _) = entry?;
            ids.push(key.value().1.to_string());
        }
        let table = txn.open_table(TICKETS_TABLE)?;
        let mut tickets = Vec::new();
        for id in ids {
            if let Some(guard) = table.get(id.as_str())? {
                tickets.push(decode(guard.value())?);
            }
        }
        tickets.sort_by(|a: &KotTicket, b: &KotTicket| a.created_at.cmp(&b.created_at));
        Ok(tickets)
    }

    /// All persisted tickets (station displays filter this down).
    pub fn all_tickets(&self) -> StorageResult<Vec<KotTicket>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TICKETS_TABLE)?;
        let mut tickets = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tickets.push(decode(value.value())?);
        }
        tickets.sort_by(|a: &KotTicket, b: &KotTicket| a.created_at.cmp(&b.created_at));
        Ok(tickets)
    }

    // ========== Invoices ==========

    pub fn put_invoice(&self, txn: &WriteTransaction, invoice: &Invoice) -> StorageResult<()> {
        let bytes = encode(invoice)?;
        let mut table = txn.open_table(INVOICES_TABLE)?;
        table.insert(invoice.id.as_str(), bytes.as_slice())?;
        let mut index = txn.open_table(ORDER_INVOICES_TABLE)?;
        index.insert((invoice.order_id.as_str(), invoice.id.as_str()), ())?;
        Ok(())
    }

    pub fn get_invoice_txn(
        &self,
        txn: &WriteTransaction,
        invoice_id: &str,
    ) -> StorageResult<Option<Invoice>> {
        let table = txn.open_table(INVOICES_TABLE)?;
        table
            .get(invoice_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn get_invoice(&self, invoice_id: &str) -> StorageResult<Option<Invoice>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INVOICES_TABLE)?;
        table
            .get(invoice_id)?
            .map(|g| decode(g.value()))
            .transpose()
    }

    pub fn invoices_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<Invoice>> {
        let index = txn.open_table(ORDER_INVOICES_TABLE)?;
        let mut ids = Vec::new();
        for entry in index.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (key, _) = entry?;
            ids.push(key.value().1.to_string());
        }
        let table = txn.open_table(INVOICES_TABLE)?;
        let mut invoices = Vec::new();
        for id in ids {
            if let Some(guard) = table.get(id.as_str())? {
                invoices.push(decode(guard.value())?);
            }
        }
        invoices.sort_by(|a: &Invoice, b: &Invoice| a.created_at.cmp(&b.created_at));
        Ok(invoices)
    }

    pub fn invoices_for_order(&self, order_id: &str) -> StorageResult<Vec<Invoice>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(ORDER_INVOICES_TABLE)?;
        let mut ids = Vec::new();
        for entry in index.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (key, _) = entry?;
            ids.push(key.value().1.to_string());
        }
        let table = txn.open_table(INVOICES_TABLE)?;
        let mut invoices = Vec::new();
        for id in ids {
            if let Some(guard) = table.get(id.as_str())? {
                invoices.push(decode(guard.value())?);
            }
        }
        invoices.sort_by(|a: &Invoice, b: &Invoice| a.created_at.cmp(&b.created_at));
        Ok(invoices)
    }

    // ========== Discounts ==========

    pub fn put_discount(
        &self,
        txn: &WriteTransaction,
        discount: &OrderDiscount,
    ) -> StorageResult<()> {
        let bytes = encode(discount)?;
        let mut table = txn.open_table(DISCOUNTS_TABLE)?;
        table.insert(
            (discount.order_id.as_str(), discount.id.as_str()),
            bytes.as_slice(),
        )?;
        Ok(())
    }

    pub fn discounts_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<OrderDiscount>> {
        let table = txn.open_table(DISCOUNTS_TABLE)?;
        let mut discounts = Vec::new();
        for entry in table.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (_, value) = entry?;
            discounts.push(decode(value.value())?);
        }
        discounts.sort_by(|a: &OrderDiscount, b: &OrderDiscount| a.created_at.cmp(&b.created_at));
        Ok(discounts)
    }

    pub fn discounts_for_order(&self, order_id: &str) -> StorageResult<Vec<OrderDiscount>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DISCOUNTS_TABLE)?;
        let mut discounts = Vec::new();
        for entry in table.range((order_id, "")..=(order_id, KEY_MAX))? {
            let (_, value) = entry?;
            discounts.push(decode(value.value())?);
        }
        discounts.sort_by(|a: &OrderDiscount, b: &OrderDiscount| a.created_at.cmp(&b.created_at));
        Ok(discounts)
    }
}
