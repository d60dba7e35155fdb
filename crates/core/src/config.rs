//! Configuration for the migration engine: connection string, database
//! name, migrations directory, and ledger collection, each overridable per
//! invocation.

use std::env;
use std::path::PathBuf;

use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

use crate::error::{MigrateError, MigrateResult};

pub const DEFAULT_MONGODB_URL: &str = "mongodb://localhost:27017";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_LEDGER_COLLECTION: &str = "tidemark_migrations";

#[derive(Debug, Clone)]
pub struct Config {
    /// MongoDB connection string.
    pub mongodb_url: String,
    /// Target database name. When unset, the connection string's default
    /// database is used; having neither is a configuration error.
    pub database: Option<String>,
    /// Directory scanned for migration scripts.
    pub migrations_dir: PathBuf,
    /// Name of the ledger collection.
    pub ledger_collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongodb_url: DEFAULT_MONGODB_URL.to_string(),
            database: None,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            ledger_collection: DEFAULT_LEDGER_COLLECTION.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `MONGODB_URL`, `MONGODB_DATABASE`,
    /// `MIGRATIONS_DIR`, and `LEDGER_COLLECTION`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mongodb_url: env_var("MONGODB_URL").unwrap_or(defaults.mongodb_url),
            database: env_var("MONGODB_DATABASE"),
            migrations_dir: env_var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_dir),
            ledger_collection: env_var("LEDGER_COLLECTION").unwrap_or(defaults.ledger_collection),
        }
    }

    /// Parse the connection string and hand out the database handle.
    ///
    /// The client connects lazily; one connection is acquired per invocation
    /// and held for its duration.
    pub async fn connect(&self) -> MigrateResult<Database> {
        let options = ClientOptions::parse(&self.mongodb_url).await?;
        let name = self
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| {
                MigrateError::configuration(
                    "no database name configured; set MONGODB_DATABASE or put one in the connection string",
                )
            })?;
        let client = Client::with_options(options)?;
        Ok(client.database(&name))
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
