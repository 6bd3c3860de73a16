//! Actor identity

use serde::{Deserialize, Serialize};

/// An already-authenticated staff member performing an operation.
///
/// Role resolution happens outside the engine; by the time a call reaches a
/// manager the only question left is "is this user privileged or the session
/// owner?" (spec: manager/admin/cashier roles collapse into `privileged`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
    /// True for roles allowed to bypass table-session ownership.
    pub privileged: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            privileged: false,
        }
    }

    pub fn privileged(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            privileged: true,
        }
    }
}
