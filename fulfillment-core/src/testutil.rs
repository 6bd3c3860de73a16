//! Shared test fixtures: an in-memory engine and a stub menu oracle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use shared::Actor;
use shared::models::{ItemTaxDetail, StationKind, StationRef, TaxComponentRate};

use crate::config::OutletConfig;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::pricing::{ItemSelection, MenuLookup, PricedLine};
use crate::printing::PrintJob;

pub(crate) fn gst5() -> ItemTaxDetail {
    ItemTaxDetail {
        group_id: "gst-5".to_string(),
        components: vec![
            TaxComponentRate {
                code: "CGST".to_string(),
                rate: 2.5,
            },
            TaxComponentRate {
                code: "SGST".to_string(),
                rate: 2.5,
            },
        ],
    }
}

pub(crate) fn station(id: &str, kind: StationKind) -> StationRef {
    StationRef {
        id: id.to_string(),
        name: id.to_string(),
        kind,
    }
}

/// Fixed-price menu oracle for tests.
pub(crate) struct StubMenu {
    items: HashMap<String, PricedLine>,
}

impl StubMenu {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    pub fn with_item(mut self, id: &str, price: f64, station: Option<StationRef>) -> Self {
        self.items.insert(
            id.to_string(),
            PricedLine {
                name: id.to_string(),
                variant_name: None,
                unit_price: price,
                addons: Vec::new(),
                tax: Some(gst5()),
                station,
            },
        );
        self
    }

}

impl MenuLookup for StubMenu {
    fn price_line(&self, selection: &ItemSelection) -> CoreResult<PricedLine> {
        self.items
            .get(&selection.menu_item_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("menu item", &selection.menu_item_id))
    }
}

pub(crate) fn owner() -> Actor {
    Actor::new("u-owner", "Asha")
}

pub(crate) fn stranger() -> Actor {
    Actor::new("u-other", "Ravi")
}

pub(crate) fn manager() -> Actor {
    Actor::privileged("u-mgr", "Meera")
}

/// In-memory engine with the default outlet config. Keep the receiver alive
/// so print effects land in the queue instead of being dropped.
pub(crate) fn test_engine(menu: StubMenu) -> (Engine, mpsc::Receiver<PrintJob>) {
    test_engine_with(OutletConfig::default(), menu)
}

pub(crate) fn test_engine_with(
    config: OutletConfig,
    menu: StubMenu,
) -> (Engine, mpsc::Receiver<PrintJob>) {
    Engine::in_memory(config, Arc::new(menu)).expect("in-memory engine")
}

/// A menu with one kitchen dish, one grill dish and one bar drink.
pub(crate) fn standard_menu() -> StubMenu {
    StubMenu::new()
        .with_item("dal-makhani", 250.0, None)
        .with_item("paneer-tikka", 320.0, Some(station("grill", StationKind::Kitchen)))
        .with_item("mojito", 180.0, Some(station("bar-1", StationKind::Bar)))
}
