//! Migration catalog: discovery, validation, and ordering of migration
//! units, plus scaffolding of new migration files.
//!
//! The catalog is rebuilt from the migrations directory on every invocation
//! and never persisted. The whole directory is parsed and validated before
//! anything executes, so a malformed later file cannot fail a batch midway.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::Document;
use serde::Deserialize;
use tracing::debug;

use crate::error::{MigrateError, MigrateResult};
use crate::migrations::definitions::MigrationId;
use crate::migrations::unit::{MigrationUnit, ScriptMigration};

/// File extension migration scripts must carry.
const SCRIPT_EXTENSION: &str = "json";

/// On-disk script shape before validation. Both sections are required; the
/// options exist so their absence can be reported precisely.
#[derive(Debug, Deserialize)]
struct RawScript {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    upgrade: Option<Vec<Document>>,
    #[serde(default)]
    downgrade: Option<Vec<Document>>,
}

/// One discovered migration: identifier, description, and the executable
/// apply/revert capability.
#[derive(Clone)]
pub struct CatalogEntry {
    pub id: MigrationId,
    pub description: String,
    pub unit: Arc<dyn MigrationUnit>,
}

impl CatalogEntry {
    pub fn new(
        id: MigrationId,
        description: impl Into<String>,
        unit: Arc<dyn MigrationUnit>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            unit,
        }
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The ordered registry of available migration units.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Discover migrations from a directory.
    ///
    /// Scans for `<14-digit timestamp>_<slug>.json`; files not matching the
    /// naming convention are ignored. A missing directory yields an empty
    /// catalog. Malformed scripts and duplicate ordering keys are load-time
    /// errors.
    pub fn load(dir: &Path) -> MigrateResult<Self> {
        if !dir.exists() {
            return Ok(Self::default());
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(dir)? {
            let path = dir_entry?.path();
            if path.extension().map_or(true, |ext| ext != SCRIPT_EXTENSION) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<MigrationId>().ok())
            else {
                debug!(path = %path.display(), "skipping file outside the migration naming convention");
                continue;
            };
            entries.push(Self::parse_script(&path, id)?);
        }

        Self::from_entries(entries)
    }

    /// Assemble a catalog from already-built entries, e.g. code-defined
    /// units registered by an embedding application. Sorts ascending and
    /// enforces the uniqueness invariant.
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> MigrateResult<Self> {
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        for pair in entries.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(MigrateError::DuplicateIdentifier {
                    id: pair[0].id.to_string(),
                });
            }
            // Identical timestamps with different slugs have no defined
            // order and are rejected the same way.
            if pair[0].id.timestamp() == pair[1].id.timestamp() {
                return Err(MigrateError::DuplicateIdentifier {
                    id: pair[0].id.timestamp().to_string(),
                });
            }
        }

        Ok(Self { entries })
    }

    fn parse_script(path: &Path, id: MigrationId) -> MigrateResult<CatalogEntry> {
        let invalid = |reason: String| MigrateError::InvalidMigration {
            id: id.to_string(),
            reason,
        };

        let contents = fs::read_to_string(path)?;
        let raw: RawScript =
            serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;

        let upgrade = raw
            .upgrade
            .ok_or_else(|| invalid("missing `upgrade` section".to_string()))?;
        let downgrade = raw
            .downgrade
            .ok_or_else(|| invalid("missing `downgrade` section".to_string()))?;

        let description = match raw.description.filter(|d| !d.trim().is_empty()) {
            Some(description) => description,
            None => id.slug().replace('_', " "),
        };

        Ok(CatalogEntry::new(
            id,
            description,
            Arc::new(ScriptMigration::new(upgrade, downgrade)),
        ))
    }

    /// All entries, ascending by identifier.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Look up an entry by identifier.
    pub fn find(&self, id: &MigrationId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Create a new migration file from a description.
///
/// The description is slugified the way the file convention expects
/// (lowercased, spaces and hyphens to underscores, everything else
/// non-alphanumeric dropped) and prefixed with the current UTC timestamp.
/// Returns the new identifier and the path written.
pub fn scaffold_migration(dir: &Path, description: &str) -> MigrateResult<(MigrationId, PathBuf)> {
    let slug = slugify(description);
    if slug.is_empty() {
        return Err(MigrateError::configuration(
            "migration description must contain at least one alphanumeric character",
        ));
    }

    fs::create_dir_all(dir)?;

    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let id: MigrationId = format!("{timestamp}_{slug}").parse()?;
    let path = dir.join(format!("{id}.{SCRIPT_EXTENSION}"));

    let contents = format!(
        "{{\n  \"description\": {},\n  \"upgrade\": [],\n  \"downgrade\": []\n}}\n",
        serde_json::to_string(description)?
    );
    fs::write(&path, contents)?;

    Ok((id, path))
}

fn slugify(description: &str) -> String {
    description
        .to_lowercase()
        .replace([' ', '-'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID_SCRIPT: &str = r#"{"upgrade": [], "downgrade": []}"#;

    fn write_script(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_load_orders_by_timestamp() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230301000000_third.json", VALID_SCRIPT);
        write_script(&dir, "20230101000000_first.json", VALID_SCRIPT);
        write_script(&dir, "20230201000000_second.json", VALID_SCRIPT);

        let catalog = Catalog::load(dir.path()).unwrap();
        let ids: Vec<_> = catalog.entries().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "20230101000000_first",
                "20230201000000_second",
                "20230301000000_third",
            ]
        );
    }

    #[test]
    fn test_load_ignores_files_outside_convention() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_keep.json", VALID_SCRIPT);
        write_script(&dir, "README.md", "not a migration");
        write_script(&dir, "notes.json", VALID_SCRIPT);
        write_script(&dir, "20230101000000.json", VALID_SCRIPT);
        write_script(&dir, "20230101000000_keep.json.bak", VALID_SCRIPT);

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].id.as_str(), "20230101000000_keep");
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::load(&dir.path().join("does_not_exist")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_missing_downgrade_is_invalid() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_bad.json", r#"{"upgrade": []}"#);

        let err = Catalog::load(dir.path()).unwrap_err();
        match err {
            MigrateError::InvalidMigration { id, reason } => {
                assert_eq!(id, "20230101000000_bad");
                assert!(reason.contains("downgrade"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_upgrade_is_invalid() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_bad.json", r#"{"downgrade": []}"#);

        let err = Catalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigration { .. }));
        assert!(err.to_string().contains("upgrade"));
    }

    #[test]
    fn test_unparseable_script_is_invalid() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_bad.json", "{ not json");

        let err = Catalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigration { .. }));
    }

    #[test]
    fn test_duplicate_timestamps_are_rejected() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_one.json", VALID_SCRIPT);
        write_script(&dir, "20230101000000_two.json", VALID_SCRIPT);

        let err = Catalog::load(dir.path()).unwrap_err();
        match err {
            MigrateError::DuplicateIdentifier { id } => assert_eq!(id, "20230101000000"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_entries_rejects_duplicate_identifiers() {
        let unit: Arc<dyn MigrationUnit> = Arc::new(ScriptMigration::new(vec![], vec![]));
        let id: MigrationId = "20230101000000_same".parse().unwrap();
        let entries = vec![
            CatalogEntry::new(id.clone(), "one", unit.clone()),
            CatalogEntry::new(id, "two", unit),
        ];

        let err = Catalog::from_entries(entries).unwrap_err();
        match err {
            MigrateError::DuplicateIdentifier { id } => assert_eq!(id, "20230101000000_same"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "20230101000000_a.json", VALID_SCRIPT);
        let catalog = Catalog::load(dir.path()).unwrap();

        let present: MigrationId = "20230101000000_a".parse().unwrap();
        let absent: MigrationId = "20230102000000_b".parse().unwrap();
        assert!(catalog.find(&present).is_some());
        assert!(catalog.find(&absent).is_none());
    }

    #[test]
    fn test_description_prefers_script_field() {
        let dir = TempDir::new().unwrap();
        write_script(
            &dir,
            "20230101000000_add_email.json",
            r#"{"description": "Index users by email", "upgrade": [], "downgrade": []}"#,
        );
        write_script(&dir, "20230102000000_drop_legacy_flags.json", VALID_SCRIPT);

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(catalog.entries()[0].description, "Index users by email");
        assert_eq!(catalog.entries()[1].description, "drop legacy flags");
    }

    #[test]
    fn test_scaffold_creates_loadable_migration() {
        let dir = TempDir::new().unwrap();
        let (id, path) = scaffold_migration(dir.path(), "Add E-mail index!").unwrap();

        assert_eq!(id.slug(), "add_e_mail_index");
        assert!(path.exists());

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].id, id);
        assert_eq!(catalog.entries()[0].description, "Add E-mail index!");
    }

    #[test]
    fn test_scaffold_rejects_empty_slug() {
        let dir = TempDir::new().unwrap();
        let err = scaffold_migration(dir.path(), "!!!").unwrap_err();
        assert!(matches!(err, MigrateError::Configuration { .. }));
    }
}
