//! The version ledger: the durable record of which migrations have been
//! applied and when.
//!
//! Entries are created on successful apply and deleted on successful revert,
//! never mutated in place. The unique index on `version` is a required
//! invariant of the storage: concurrent invocations may both compute a stale
//! pending set, and the index is the only thing preventing a double apply
//! from being recorded twice.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneOptions, FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::warn;

use crate::error::MigrateResult;
use crate::migrations::definitions::{LedgerEntry, MigrationId};

/// Storage contract for the version ledger: a named collection with a unique
/// key on the identifier, supporting insert, delete-by-key, and find-all.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Idempotently bootstrap the backing storage (collection + unique
    /// index). Called before every engine operation.
    async fn ensure_ready(&self) -> MigrateResult<()>;

    /// All entries, ascending by identifier.
    async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>>;

    /// The set of applied identifiers.
    async fn applied(&self) -> MigrateResult<BTreeSet<MigrationId>> {
        Ok(self.entries().await?.into_iter().map(|e| e.id).collect())
    }

    /// Record a migration as applied. Only called after its apply logic
    /// returned without error.
    async fn record(&self, entry: LedgerEntry) -> MigrateResult<()>;

    /// Delete the entry for a reverted migration.
    async fn unrecord(&self, id: &MigrationId) -> MigrateResult<()>;

    /// The entry with the maximum identifier — the default rollback target.
    async fn latest(&self) -> MigrateResult<Option<LedgerEntry>>;
}

/// MongoDB-backed ledger over a typed collection.
pub struct MongoLedger {
    collection: Collection<LedgerEntry>,
}

impl MongoLedger {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }
}

#[async_trait]
impl LedgerStore for MongoLedger {
    async fn ensure_ready(&self) -> MigrateResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "version": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        Ok(())
    }

    async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        let options = FindOptions::builder().sort(doc! { "version": 1 }).build();
        let cursor = self.collection.find(doc! {}, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn record(&self, entry: LedgerEntry) -> MigrateResult<()> {
        self.collection.insert_one(&entry, None).await?;
        Ok(())
    }

    async fn unrecord(&self, id: &MigrationId) -> MigrateResult<()> {
        let result = self
            .collection
            .delete_one(doc! { "version": id.as_str() }, None)
            .await?;
        if result.deleted_count == 0 {
            warn!(%id, "ledger entry was already gone");
        }
        Ok(())
    }

    async fn latest(&self) -> MigrateResult<Option<LedgerEntry>> {
        let options = FindOneOptions::builder()
            .sort(doc! { "version": -1 })
            .build();
        Ok(self.collection.find_one(doc! {}, options).await?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryLedger;
    use super::*;
    use chrono::{SubsecRound, Utc};
    use mongodb::bson;

    fn entry(id: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.parse().unwrap(),
            description: id.to_string(),
            applied_at: Utc::now().round_subsecs(3),
        }
    }

    #[test]
    fn test_ledger_entry_bson_round_trip() {
        let original = entry("20230101000000_a");
        let doc = bson::to_document(&original).unwrap();
        assert!(doc.get_str("version").is_ok());
        assert!(doc.get_datetime("applied_at").is_ok());

        let decoded: LedgerEntry = bson::from_document(doc).unwrap();
        assert_eq!(decoded, original);
    }

    #[tokio::test]
    async fn test_latest_is_maximum_identifier() {
        let ledger = MemoryLedger::with_entries(vec![
            entry("20230102000000_b"),
            entry("20230101000000_a"),
        ]);
        let latest = ledger.latest().await.unwrap().unwrap();
        assert_eq!(latest.id.as_str(), "20230102000000_b");
    }

    #[tokio::test]
    async fn test_record_enforces_uniqueness() {
        let ledger = MemoryLedger::default();
        ledger.record(entry("20230101000000_a")).await.unwrap();
        assert!(ledger.record(entry("20230101000000_a")).await.is_err());
    }
}
