//! Order-fulfillment engine for a restaurant point of sale.
//!
//! Turns a table's ordered dishes into routed kitchen/bar tickets, tracks
//! their preparation lifecycle, and produces a financially-correct bill.
//!
//! # Architecture
//!
//! ```text
//! OrderManager ──▶ Station Router ──▶ TicketManager ──▶ print / notify
//!      │                                                    ▲
//!      ▼                                                    │
//! Tax Calculator ──▶ BillingManager ────────────────────────┘
//! ```
//!
//! The persisted Order/Item/Ticket/Invoice graph in [`storage`] is the
//! single source of truth; no component keeps authoritative state in memory
//! across calls. Every operation is one write transaction — it commits or
//! rolls back whole — and side effects (print jobs, notifications) dispatch
//! only after the commit, so a downstream failure can never unwind durable
//! state.
//!
//! External collaborators sit behind seams: the menu/pricing oracle
//! ([`pricing::MenuLookup`]), the printer bridge ([`printing::PrintSink`])
//! and the real-time transport (the broadcast bus in [`notify`]). Actors
//! arrive pre-authenticated with a single `privileged` flag.

pub mod billing;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod logging;
pub mod money;
pub mod notify;
pub mod orders;
pub mod pricing;
pub mod printing;
pub mod routing;
pub mod storage;
pub mod tickets;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports
pub use billing::{BillingManager, DiscountRequest};
pub use config::{ChargeBasis, ChargeTaxTreatment, OutletConfig, ServiceChargeRule};
pub use engine::{Engine, OrderDetail};
pub use error::{CoreError, CoreResult};
pub use orders::{CancelItemRequest, CancelOrderRequest, CreateOrderRequest, OrderManager};
pub use pricing::{ItemSelection, MenuLookup, PricedLine};
pub use storage::CoreStorage;
pub use tickets::TicketManager;

// Re-export shared types for convenience
pub use shared::Actor;
pub use shared::event::{NotificationEvent, NotificationPayload};
pub use shared::models::{
    Invoice, InvoiceStatus, KotItem, KotTicket, Order, OrderDiscount, OrderItem, OrderItemStatus,
    OrderStatus, OrderType, StationKind, StationRef, TableSession, TicketStatus,
};
