//! Engine error kinds.
//!
//! Every variant is recoverable by the caller: the owning write transaction
//! is dropped (rolled back) before the error surfaces, and the variant
//! carries enough context (current status, owner identity) to decide the
//! next action without re-querying.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} in status {current} does not allow {action}")]
    InvalidStateTransition {
        entity: &'static str,
        current: String,
        action: &'static str,
    },

    #[error("table session is owned by {owner_name} ({owner_id})")]
    NotSessionOwner {
        owner_id: String,
        owner_name: String,
    },

    #[error("cancelling work in status {status} requires an approver")]
    ApprovalRequired { status: String },

    #[error("no pending items eligible for a ticket")]
    NoPendingItems,

    #[error("order already paid: {0}")]
    OrderAlreadyPaid(String),

    #[error("invoice already paid: {0}")]
    InvoicePaid(String),

    #[error("table {0} is occupied")]
    TargetUnavailable(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        current: impl Into<String>,
        action: &'static str,
    ) -> Self {
        CoreError::InvalidStateTransition {
            entity,
            current: current.into(),
            action,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
