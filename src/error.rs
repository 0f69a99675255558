//! Error types for the sync engine

use thiserror::Error;

use crate::token::TokenError;
use crate::types::SyncConflict;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync engine error taxonomy
///
/// `IntegrityCheckFailed` and `UnresolvedConflicts` are expected,
/// recoverable outcomes a well-behaved client will see in normal
/// operation; nothing here is treated as fatal.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("Conflict already resolved: {0}")]
    ConflictAlreadyResolved(String),

    #[error("Operation already completed: {0}")]
    OperationAlreadyCompleted(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    #[error("{} unresolved conflicts require manual resolution", .0.len())]
    UnresolvedConflicts(Vec<SyncConflict>),

    #[error("Merged resolution requires a merged value")]
    MissingMergedValue,

    #[error("Token service error: {0}")]
    TokenService(#[from] TokenError),

    #[error("Token was issued for service '{0}', not this engine")]
    ForeignToken(String),
}
