//! Migration system: catalog discovery, the version ledger, and the engine
//! that drives apply/rollback execution.

pub mod catalog;
pub mod definitions;
pub mod ledger;
pub mod runner;
pub mod unit;

pub use catalog::{scaffold_migration, Catalog, CatalogEntry};
pub use definitions::{
    LedgerEntry, MigrateFailure, MigrateReport, MigrationId, MigrationState, Plan, RollbackReport,
    StatusEntry,
};
pub use ledger::{LedgerStore, MongoLedger};
pub use runner::Migrator;
pub use unit::{MigrationUnit, ScriptMigration};
