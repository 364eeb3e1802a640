//! Error types for lifecycle decisions.

use crate::phase::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Why a transition was refused. None of these imply a mutation happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Current phase is not in the rule's allowed source set.
    #[error("cannot {action} an item in {from}")]
    PhaseViolation { from: Phase, action: &'static str },

    /// Actor role is not in the rule's allow-list.
    #[error("role '{role}' is not allowed to {action}")]
    PermissionDenied { role: String, action: &'static str },

    /// A required field is missing or invalid.
    #[error("{0}")]
    Validation(String),

    /// The item is already where the request would leave it.
    #[error("item is already in {0}")]
    NoChange(Phase),
}

impl LifecycleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
