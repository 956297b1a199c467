//! Crate-wide error type
//!
//! Every component in `gnosis-core` returns this single error type rather
//! than inventing its own per-module taxonomy: the graph store, the
//! transaction manager, the indexes, and the memory layer all share the
//! same failure vocabulary, so callers can match on one enum
//! regardless of which component raised it.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The full error taxonomy exposed to callers.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No entity exists with the given name.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// No relation exists matching (from, to, relation_type).
    #[error("relation not found: {from} -> {to} ({relation_type})")]
    RelationNotFound {
        from: String,
        to: String,
        relation_type: String,
    },

    /// An entity with this name already exists.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    /// A relation with this (from, to, relation_type) key already exists.
    #[error("duplicate relation: {from} -> {to} ({relation_type})")]
    DuplicateRelation {
        from: String,
        to: String,
        relation_type: String,
    },

    /// Input shape or semantic constraint violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Setting `parent_id` would create a cycle in the ancestor chain.
    #[error("cycle detected: setting parent of {entity} to {parent} would create a cycle")]
    CycleDetected { entity: String, parent: String },

    /// `importance` outside [0, 10].
    #[error("invalid importance {0}: must be in [0, 10]")]
    InvalidImportance(f64),

    /// A merge/aggregation operation needs at least two entities.
    #[error("insufficient entities: need at least {needed}, got {got}")]
    InsufficientEntities { needed: usize, got: usize },

    /// `begin` called while a transaction is already Active.
    #[error("a transaction is already active")]
    TransactionActive,

    /// A mutating call was made with no active transaction.
    #[error("no active transaction")]
    NoTransaction,

    /// Underlying storage (file or alternate backend) failed.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Import failed to parse or apply an external format.
    #[error("import failed: {0}")]
    ImportFailure(String),

    /// Export failed to serialize to an external format.
    #[error("export failed: {0}")]
    ExportFailure(String),

    /// A caller-supplied cancellation signal fired before the operation completed.
    #[error("operation cancelled")]
    OperationCancelled,

    /// A persisted index's version does not match the current format.
    #[error("index stale: on-disk version {on_disk} != expected {expected}")]
    IndexStale { on_disk: u32, expected: u32 },

    /// Rollback itself failed; the backup was retained for manual recovery.
    #[error("manual recovery required: backup retained at {backup_path}")]
    ManualRecoveryRequired { backup_path: PathBuf },

    /// Wraps an I/O error encountered while reading or writing persisted state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps a JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wraps an error from the optional SQLite alternate backend.
    #[cfg(feature = "sqlite-backend")]
    #[error("sqlite backend error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// True for errors that should trigger a transaction rollback rather
    /// than simply being surfaced.
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self,
            Error::StorageFailure(_)
                | Error::DuplicateEntity(_)
                | Error::DuplicateRelation { .. }
                | Error::CycleDetected { .. }
                | Error::Validation(_)
                | Error::EntityNotFound(_)
                | Error::Io(_)
        )
    }
}
