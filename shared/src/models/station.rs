//! Preparation stations

use serde::{Deserialize, Serialize};

/// Station type — a closed set so ticket routing is exhaustively checked.
///
/// Legacy menu data carries free-text station labels ("Main Bar", "bar-2",
/// "Dessert Counter"); [`StationKind::normalize`] canonicalizes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StationKind {
    #[default]
    Kitchen,
    Bar,
    Dessert,
    Mocktail,
}

impl StationKind {
    /// Canonicalize a free-text station-type label by substring match.
    ///
    /// Unknown labels fall back to `Kitchen`. "mocktail" is checked before
    /// "bar" so a "Mocktail Bar" counter routes to the mocktail station.
    pub fn normalize(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("mocktail") {
            StationKind::Mocktail
        } else if label.contains("bar") {
            StationKind::Bar
        } else if label.contains("dessert") {
            StationKind::Dessert
        } else {
            StationKind::Kitchen
        }
    }

    /// Ticket number prefix for this station type.
    pub fn ticket_prefix(&self) -> &'static str {
        match self {
            StationKind::Bar | StationKind::Mocktail => "BOT",
            StationKind::Kitchen | StationKind::Dessert => "KOT",
        }
    }
}

/// A physical preparation point. Two stations of the same kind are distinct
/// routing targets (each maps to its own printer), so identity is `id`, never
/// `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationRef {
    pub id: String,
    pub name: String,
    pub kind: StationKind,
}

impl StationRef {
    /// The default bucket for items with no configured station.
    pub fn default_kitchen() -> Self {
        Self {
            id: "kitchen".to_string(),
            name: "Kitchen".to_string(),
            kind: StationKind::Kitchen,
        }
    }
}
