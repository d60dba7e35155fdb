//! Core types for the migration system: identifiers, ledger entries,
//! plans, and operation reports.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateError;
use crate::migrations::catalog::Catalog;

/// Number of digits in the timestamp prefix (`YYYYMMDDHHMMSS`).
pub const TIMESTAMP_LEN: usize = 14;

/// A migration identifier: a 14-digit creation timestamp, an underscore,
/// and a slug (e.g. `20231104120000_add_email`).
///
/// Identifiers order lexicographically, which is equivalent to chronological
/// order of the timestamp prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    /// The full identifier token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 14-digit timestamp prefix, the ordering key.
    pub fn timestamp(&self) -> &str {
        &self.0[..TIMESTAMP_LEN]
    }

    /// The slug following the timestamp prefix.
    pub fn slug(&self) -> &str {
        &self.0[TIMESTAMP_LEN + 1..]
    }
}

impl FromStr for MigrationId {
    type Err = MigrateError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let bytes = token.as_bytes();
        let valid = bytes.len() > TIMESTAMP_LEN + 1
            && bytes[..TIMESTAMP_LEN].iter().all(u8::is_ascii_digit)
            && bytes[TIMESTAMP_LEN] == b'_';
        if valid {
            Ok(Self(token.to_string()))
        } else {
            Err(MigrateError::InvalidMigration {
                id: token.to_string(),
                reason: "identifier must follow the format <14-digit timestamp>_<slug>".to_string(),
            })
        }
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the version ledger: a migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The applied migration's identifier. Carries a unique index in the
    /// ledger collection.
    #[serde(rename = "version")]
    pub id: MigrationId,
    /// Human-readable description captured at apply time.
    pub description: String,
    /// When the migration was applied.
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build an entry for a migration applied right now.
    pub fn new(id: MigrationId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            applied_at: Utc::now(),
        }
    }
}

/// The pending/applied diff between a catalog and a ledger.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Catalog identifiers with no ledger entry, in ascending order.
    pub pending: Vec<MigrationId>,
    /// Identifiers recorded as applied.
    pub applied: BTreeSet<MigrationId>,
}

impl Plan {
    /// Diff a catalog against the set of applied identifiers. Pure function,
    /// no side effects; `pending` preserves the catalog's ascending order.
    pub fn compute(catalog: &Catalog, applied: BTreeSet<MigrationId>) -> Self {
        let pending = catalog
            .entries()
            .iter()
            .map(|entry| entry.id.clone())
            .filter(|id| !applied.contains(id))
            .collect();
        Self { pending, applied }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Result of running `migrate`
#[derive(Debug)]
pub struct MigrateReport {
    /// Identifiers applied and recorded by this run, in apply order.
    pub applied: Vec<MigrationId>,
    /// The failure that stopped the batch, if any. Everything in `applied`
    /// stays committed regardless.
    pub failed: Option<MigrateFailure>,
}

impl MigrateReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// A migration that stopped a `migrate` batch.
#[derive(Debug)]
pub struct MigrateFailure {
    /// The identifier that failed.
    pub id: MigrationId,
    /// The underlying error (`Execution` or `LedgerWrite`).
    pub error: MigrateError,
}

/// Result of running `rollback`
#[derive(Debug)]
pub struct RollbackReport {
    /// The identifier whose revert logic ran and whose ledger entry was
    /// removed.
    pub reverted: MigrationId,
}

/// Derived state of one migration identifier. Never persisted; recomputed
/// from the catalog and ledger on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// In the catalog with no ledger entry.
    Pending,
    /// Recorded as applied.
    Applied { applied_at: DateTime<Utc> },
    /// Recorded as applied but absent from the catalog (its source file was
    /// deleted after being applied).
    Missing { applied_at: DateTime<Utc> },
}

/// One line of a `status` report.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub id: MigrationId,
    pub description: String,
    pub state: MigrationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parses_timestamp_and_slug() {
        let id: MigrationId = "20231104120000_add_email".parse().unwrap();
        assert_eq!(id.timestamp(), "20231104120000");
        assert_eq!(id.slug(), "add_email");
        assert_eq!(id.to_string(), "20231104120000_add_email");
    }

    #[test]
    fn identifier_rejects_malformed_tokens() {
        for token in [
            "",
            "add_email",
            "2023_add_email",
            "20231104120000",
            "20231104120000_",
            "2023110412000x_add_email",
            "20231104120000-add_email",
        ] {
            assert!(
                token.parse::<MigrationId>().is_err(),
                "expected `{token}` to be rejected"
            );
        }
    }

    #[test]
    fn identifier_ordering_is_chronological() {
        let a: MigrationId = "20230101000000_a".parse().unwrap();
        let b: MigrationId = "20230102000000_b".parse().unwrap();
        let c: MigrationId = "20241231235959_c".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }
}
