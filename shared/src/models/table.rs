//! Table session entity

use serde::{Deserialize, Serialize};

/// Who is running a table right now.
///
/// At most one open session per table; only the opening user (or a
/// privileged actor) may mutate orders carried under it. Ended explicitly or
/// implicitly when the order completes or cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSession {
    pub id: String,
    pub table_id: String,
    pub outlet_id: String,
    pub opened_by: String,
    pub opened_by_name: String,
    /// The order the session is currently carrying, if any.
    pub order_id: Option<String>,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
}

impl TableSession {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
