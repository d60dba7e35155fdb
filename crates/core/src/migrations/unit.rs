//! The migration unit contract and the script-backed implementation.
//!
//! A unit is an opaque apply/revert capability: the engine hands it a live
//! database handle and otherwise does not inspect what it does. Units are
//! idempotent by convention only; at-most-one-application is enforced by the
//! ledger, not here.

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::Database;
use tracing::debug;

/// Forward/backward logic of a single versioned change.
///
/// The database handle is passed explicitly; implementations must not hold
/// their own connections. Errors are wrapped by the engine with the failing
/// identifier attached.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Apply the change.
    async fn apply(&self, db: &Database) -> anyhow::Result<()>;

    /// Undo what `apply` did.
    async fn revert(&self, db: &Database) -> anyhow::Result<()>;
}

/// A migration defined declaratively as two sequences of MongoDB database
/// commands, e.g.
///
/// ```json
/// {
///   "description": "index users by email",
///   "upgrade": [
///     { "createIndexes": "users", "indexes": [{ "key": { "email": 1 }, "name": "email_1" }] }
///   ],
///   "downgrade": [
///     { "dropIndexes": "users", "index": "email_1" }
///   ]
/// }
/// ```
///
/// Commands run in order through `Database::run_command`; the first failure
/// stops the sequence.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    upgrade: Vec<Document>,
    downgrade: Vec<Document>,
}

impl ScriptMigration {
    pub fn new(upgrade: Vec<Document>, downgrade: Vec<Document>) -> Self {
        Self { upgrade, downgrade }
    }

    async fn run_commands(db: &Database, commands: &[Document]) -> anyhow::Result<()> {
        for command in commands {
            debug!(?command, "running database command");
            db.run_command(command.clone(), None).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationUnit for ScriptMigration {
    async fn apply(&self, db: &Database) -> anyhow::Result<()> {
        Self::run_commands(db, &self.upgrade).await
    }

    async fn revert(&self, db: &Database) -> anyhow::Result<()> {
        Self::run_commands(db, &self.downgrade).await
    }
}
