//! # tidemark-core: migration engine for MongoDB
//!
//! Discovers versioned change scripts from a migrations directory, applies
//! pending ones in timestamp order, records applied state in a ledger
//! collection, and supports reverting the most recent (or a named) change.
//!
//! The engine is synchronous in shape — one invocation runs its plan top to
//! bottom, suspending only on database I/O — and provides no cross-process
//! mutual exclusion; the ledger's unique index is the safety net against
//! concurrent invocations.

pub mod config;
pub mod error;
pub mod migrations;

// Re-export core types at the crate root
pub use config::Config;
pub use error::{MigrateError, MigrateResult};
pub use migrations::*;
