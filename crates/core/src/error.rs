//! Error types for the migration engine
//!
//! Catalog validation errors abort the whole command before anything
//! executes. Per-unit execution errors abort only the remainder of a batch;
//! progress committed before the failure stays recorded.

use thiserror::Error;

use crate::migrations::definitions::MigrationId;

/// Result type alias for engine operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error type for the migration engine
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A catalog entry is malformed (unparseable script, or missing its
    /// upgrade/downgrade capability). Raised at load time, before execution.
    #[error("invalid migration `{id}`: {reason}")]
    InvalidMigration { id: String, reason: String },

    /// Two catalog entries share an identifier or a timestamp prefix.
    #[error("duplicate migration identifier `{id}`")]
    DuplicateIdentifier { id: String },

    /// A rollback target is recorded in the ledger but its source file no
    /// longer exists in the migrations directory.
    #[error("no migration file found for `{id}`; it may have been deleted after being applied")]
    MissingMigrationFile { id: MigrationId },

    /// A named rollback target has no ledger entry.
    #[error("migration `{id}` is not recorded as applied")]
    NotApplied { id: MigrationId },

    /// Rollback was invoked against an empty ledger.
    #[error("no applied migrations to roll back")]
    NoAppliedMigrations,

    /// A unit's apply or revert logic failed. Halts the batch immediately;
    /// later pending units are not attempted.
    #[error("migration `{id}` failed: {cause:#}")]
    Execution {
        id: MigrationId,
        cause: anyhow::Error,
    },

    /// The post-apply/post-revert ledger update failed. The unit's side
    /// effects landed but the bookkeeping did not; the ledger now disagrees
    /// with the database and requires manual reconciliation.
    #[error("ledger update for `{id}` failed; applied state is now inconsistent and requires manual reconciliation: {source}")]
    LedgerWrite {
        id: MigrationId,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl MigrateError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// The identifier this error is attached to, if any.
    pub fn migration_id(&self) -> Option<&MigrationId> {
        match self {
            Self::MissingMigrationFile { id }
            | Self::NotApplied { id }
            | Self::Execution { id, .. }
            | Self::LedgerWrite { id, .. } => Some(id),
            _ => None,
        }
    }
}
