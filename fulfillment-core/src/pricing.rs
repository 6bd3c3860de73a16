//! Menu/pricing oracle boundary.
//!
//! The engine never owns menu data. Given an item + variant + addon
//! selection and a floor context, the oracle returns the effective unit
//! price, the applicable tax group and the configured preparation station.

use shared::models::{ItemTaxDetail, OrderItemAddon, StationRef};

use crate::error::CoreResult;

/// A requested order line, as chosen on the captain's device.
#[derive(Debug, Clone)]
pub struct ItemSelection {
    pub menu_item_id: String,
    pub variant_id: Option<String>,
    pub addon_ids: Vec<String>,
    pub quantity: i32,
    pub note: Option<String>,
    /// Floor/section context for section-scoped price lists.
    pub section: Option<String>,
}

impl ItemSelection {
    pub fn new(menu_item_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            variant_id: None,
            addon_ids: Vec::new(),
            quantity,
            note: None,
            section: None,
        }
    }
}

/// The oracle's answer for one selection.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub name: String,
    pub variant_name: Option<String>,
    /// Effective per-unit price: base price, or the variant override.
    pub unit_price: f64,
    pub addons: Vec<OrderItemAddon>,
    /// Tax group snapshot; `None` means the line carries no tax.
    pub tax: Option<ItemTaxDetail>,
    /// Configured preparation station; `None` routes to the default kitchen.
    pub station: Option<StationRef>,
}

/// Menu/pricing lookup implemented by the catalog collaborator.
pub trait MenuLookup: Send + Sync {
    fn price_line(&self, selection: &ItemSelection) -> CoreResult<PricedLine>;
}
