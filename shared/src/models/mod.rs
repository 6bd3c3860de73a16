//! Entity models for the persisted order graph.
//!
//! One struct per persisted record. Status enums serialize as
//! `SCREAMING_SNAKE_CASE` so collaborators see stable wire values.

pub mod discount;
pub mod invoice;
pub mod item;
pub mod order;
pub mod station;
pub mod table;
pub mod ticket;

pub use discount::{DiscountScope, DiscountValue, OrderDiscount};
pub use invoice::{Invoice, InvoiceStatus, PaymentRecord, TaxComponentBreakup};
pub use item::{
    CancelKind, ItemTaxDetail, OrderItem, OrderItemAddon, OrderItemStatus, TaxComponentRate,
};
pub use order::{Order, OrderStatus, OrderType};
pub use station::{StationKind, StationRef};
pub use table::TableSession;
pub use ticket::{KotItem, KotItemStatus, KotTicket, TicketStatus};
