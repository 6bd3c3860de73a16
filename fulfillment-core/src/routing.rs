//! Station routing.
//!
//! Maps active order items to their target preparation station and groups
//! them for ticket creation. Grouping is keyed by **station identity**, not
//! station type: two kitchen stations are two groups, because each maps to
//! its own printer. Deterministic and side-effect free.

use std::collections::BTreeMap;

use shared::models::{OrderItem, StationRef};

/// One ticket-to-be: a station and the items routed to it.
#[derive(Debug, Clone)]
pub struct StationGroup {
    pub station: StationRef,
    pub items: Vec<OrderItem>,
}

/// Group items by station identity.
///
/// Items with no configured station fall into the default `kitchen` bucket.
/// Groups come back ordered by station id so repeated runs over the same
/// item set allocate ticket numbers in the same order.
pub fn group_by_station(items: Vec<OrderItem>) -> Vec<StationGroup> {
    let mut groups: BTreeMap<String, StationGroup> = BTreeMap::new();

    for item in items {
        let station = item
            .station
            .clone()
            .unwrap_or_else(StationRef::default_kitchen);
        groups
            .entry(station.id.clone())
            .or_insert_with(|| StationGroup {
                station,
                items: Vec::new(),
            })
            .items
            .push(item);
    }

    groups.into_values().collect()
}
