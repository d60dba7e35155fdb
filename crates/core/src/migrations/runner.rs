//! The migration engine: plans the pending set, drives apply and revert
//! execution against the ledger and the database connection, and reports
//! outcomes.

use std::collections::BTreeMap;

use mongodb::Database;
use tracing::info;

use crate::error::{MigrateError, MigrateResult};
use crate::migrations::catalog::Catalog;
use crate::migrations::definitions::{
    LedgerEntry, MigrateFailure, MigrateReport, MigrationId, MigrationState, Plan, RollbackReport,
    StatusEntry,
};
use crate::migrations::ledger::{LedgerStore, MongoLedger};

/// Drives migrations against one database for the duration of one
/// invocation. Owns the connection and the ledger; units receive the
/// database handle as an explicit argument.
pub struct Migrator<L = MongoLedger> {
    db: Database,
    ledger: L,
}

impl Migrator<MongoLedger> {
    /// Engine over the standard MongoDB-backed ledger.
    pub fn new(db: Database, ledger_collection: &str) -> Self {
        let ledger = MongoLedger::new(&db, ledger_collection);
        Self { db, ledger }
    }
}

impl<L: LedgerStore> Migrator<L> {
    /// Engine over a caller-supplied ledger store.
    pub fn with_ledger(db: Database, ledger: L) -> Self {
        Self { db, ledger }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Diff the catalog against the ledger. Read-only.
    pub async fn plan(&self, catalog: &Catalog) -> MigrateResult<Plan> {
        self.ledger.ensure_ready().await?;
        let applied = self.ledger.applied().await?;
        Ok(Plan::compute(catalog, applied))
    }

    /// Apply every pending migration in ascending order, recording each in
    /// the ledger after its apply logic succeeds.
    ///
    /// Execution is sequential and not transactional across units: the first
    /// failure stops the batch, and everything applied before it stays
    /// recorded, so a re-run resumes from the failure point. The failure is
    /// reported with the offending identifier rather than discarding the
    /// partial progress report.
    pub async fn migrate(&self, catalog: &Catalog) -> MigrateResult<MigrateReport> {
        let plan = self.plan(catalog).await?;

        let mut applied = Vec::new();
        for entry in catalog.entries() {
            if plan.applied.contains(&entry.id) {
                continue;
            }

            info!(id = %entry.id, "applying migration");
            if let Err(cause) = entry.unit.apply(&self.db).await {
                return Ok(MigrateReport {
                    applied,
                    failed: Some(MigrateFailure {
                        id: entry.id.clone(),
                        error: MigrateError::Execution {
                            id: entry.id.clone(),
                            cause,
                        },
                    }),
                });
            }

            let record = LedgerEntry::new(entry.id.clone(), entry.description.clone());
            if let Err(source) = self.ledger.record(record).await {
                // The unit's side effects landed but the bookkeeping did
                // not; report the migration as not applied and stop.
                return Ok(MigrateReport {
                    applied,
                    failed: Some(MigrateFailure {
                        id: entry.id.clone(),
                        error: MigrateError::LedgerWrite {
                            id: entry.id.clone(),
                            source: Box::new(source),
                        },
                    }),
                });
            }

            applied.push(entry.id.clone());
        }

        Ok(MigrateReport {
            applied,
            failed: None,
        })
    }

    /// Revert exactly one migration: the given target, or the
    /// most-recently-applied one when unspecified.
    ///
    /// The ledger entry is deleted only after the revert logic succeeds; on
    /// failure it stays intact, so the migration is still reported as
    /// applied.
    pub async fn rollback(
        &self,
        catalog: &Catalog,
        target: Option<&MigrationId>,
    ) -> MigrateResult<RollbackReport> {
        self.ledger.ensure_ready().await?;

        let record = match target {
            Some(id) => self
                .ledger
                .entries()
                .await?
                .into_iter()
                .find(|e| &e.id == id)
                .ok_or_else(|| MigrateError::NotApplied { id: id.clone() })?,
            None => self
                .ledger
                .latest()
                .await?
                .ok_or(MigrateError::NoAppliedMigrations)?,
        };

        let entry = catalog
            .find(&record.id)
            .ok_or_else(|| MigrateError::MissingMigrationFile {
                id: record.id.clone(),
            })?;

        info!(id = %record.id, "reverting migration");
        entry
            .unit
            .revert(&self.db)
            .await
            .map_err(|cause| MigrateError::Execution {
                id: record.id.clone(),
                cause,
            })?;

        self.ledger
            .unrecord(&record.id)
            .await
            .map_err(|source| MigrateError::LedgerWrite {
                id: record.id.clone(),
                source: Box::new(source),
            })?;

        Ok(RollbackReport {
            reverted: record.id,
        })
    }

    /// Read-only report over the union of the catalog and the ledger:
    /// catalog entries first in ascending order, then ledger entries whose
    /// source files no longer exist.
    pub async fn status(&self, catalog: &Catalog) -> MigrateResult<Vec<StatusEntry>> {
        self.ledger.ensure_ready().await?;

        let mut recorded: BTreeMap<MigrationId, LedgerEntry> = self
            .ledger
            .entries()
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut report = Vec::with_capacity(catalog.len() + recorded.len());
        for entry in catalog.entries() {
            let state = match recorded.remove(&entry.id) {
                Some(record) => MigrationState::Applied {
                    applied_at: record.applied_at,
                },
                None => MigrationState::Pending,
            };
            report.push(StatusEntry {
                id: entry.id.clone(),
                description: entry.description.clone(),
                state,
            });
        }

        // Whatever is left in the ledger has no catalog file anymore.
        for (_, record) in recorded {
            report.push(StatusEntry {
                id: record.id,
                description: record.description,
                state: MigrationState::Missing {
                    applied_at: record.applied_at,
                },
            });
        }

        Ok(report)
    }
}
