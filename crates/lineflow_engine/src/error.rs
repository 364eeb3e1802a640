//! Engine error taxonomy.

use lineflow_db::DbError;
use lineflow_lifecycle::{LifecycleError, Phase};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot {action} an item in {from}")]
    PhaseViolation { from: Phase, action: &'static str },

    #[error("role '{role}' is not allowed to {action}")]
    PermissionDenied { role: String, action: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The request would leave the item where it already is.
    #[error("item is already in {0}")]
    Unchanged(Phase),

    /// Another writer changed the row first, or a unique key collided.
    #[error("concurrent update: {0}")]
    Conflict(String),

    /// No state row for the phase, even after fallbacks. Aborts a batch run.
    #[error("state catalog has no entry for {0} or its fallbacks")]
    CatalogIncomplete(Phase),

    #[error("store failure: {0}")]
    StoreFailure(#[source] DbError),

    #[error("chunk timed out after {0:?}")]
    Timeout(Duration),

    #[error("run cancelled")]
    Cancelled,
}

/// Stable error kind for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PhaseViolation,
    PermissionDenied,
    Validation,
    NotFound,
    Conflict,
    CatalogIncomplete,
    StoreFailure,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhaseViolation => "phase_violation",
            Self::PermissionDenied => "permission_denied",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::CatalogIncomplete => "catalog_incomplete",
            Self::StoreFailure => "store_failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PhaseViolation { .. } | Self::Unchanged(_) => ErrorKind::PhaseViolation,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CatalogIncomplete(_) => ErrorKind::CatalogIncomplete,
            Self::StoreFailure(_) => ErrorKind::StoreFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Errors a batch absorbs at the row boundary. Everything else aborts
    /// the chunk (store failures, timeouts) or the run.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            Self::PhaseViolation { .. }
                | Self::PermissionDenied { .. }
                | Self::Validation(_)
                | Self::NotFound(_)
                | Self::Unchanged(_)
                | Self::Conflict(_)
        )
    }
}

impl From<LifecycleError> for EngineError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::PhaseViolation { from, action } => Self::PhaseViolation { from, action },
            LifecycleError::PermissionDenied { role, action } => Self::PermissionDenied { role, action },
            LifecycleError::Validation(msg) => Self::Validation(msg),
            LifecycleError::NoChange(phase) => Self::Unchanged(phase),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Self::NotFound(msg),
            DbError::Conflict(msg) | DbError::Constraint(msg) => Self::Conflict(msg),
            other => Self::StoreFailure(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreFailure(DbError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_map_to_row_level() {
        let err: EngineError = LifecycleError::PhaseViolation {
            from: Phase::Scrap,
            action: "advance",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::PhaseViolation);
        assert!(err.is_row_level());

        let err: EngineError = LifecycleError::NoChange(Phase::Empaque).into();
        assert_eq!(err.kind(), ErrorKind::PhaseViolation);
    }

    #[test]
    fn test_store_errors_abort_chunk() {
        let err: EngineError = DbError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert!(!err.is_row_level());

        let err: EngineError = DbError::conflict("item 1 is no longer in RETEST").into();
        assert!(err.is_row_level());
        assert!(!EngineError::CatalogIncomplete(Phase::Scrap).is_row_level());
        assert!(!EngineError::Timeout(Duration::from_secs(1)).is_row_level());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
