//! Discovery and generation of fixture migration files

use crate::error::{Error, Result};
use crate::models::inflection;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions recognized as fixture migrations
pub const MIGRATION_EXTENSIONS: [&str; 2] = ["sql", "rs"];

static MIGRATION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)_([_a-z0-9]*)\.(sql|rs)$")
        .expect("MigrationCatalog: Invalid migration filename regex")
});

/// A migration file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    pub version: i64,
    pub name: String,
    pub path: PathBuf,
}

impl MigrationDescriptor {
    /// Parse a descriptor from a migration file path
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::IllegalMigrationName(path.clone()))?;

        let captures = MIGRATION_FILENAME
            .captures(filename)
            .ok_or_else(|| Error::IllegalMigrationName(path.clone()))?;
        // Digits only, so the parse fails on overflow alone
        let version = captures[1]
            .parse::<i64>()
            .map_err(|_| Error::IllegalMigrationName(path.clone()))?;
        let name = captures[2].to_string();

        Ok(Self {
            version,
            name,
            path,
        })
    }

    /// PascalCase identifier Rust migrations are registered under
    pub fn type_name(&self) -> String {
        inflection::to_pascal_case(&self.name)
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
    }

    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Finds, validates and generates migration files
pub struct MigrationCatalog;

impl MigrationCatalog {
    /// Every migration under `dir`, ascending by version
    ///
    /// Files that look like migrations (leading digit, an underscore and a
    /// migration extension) must match the full naming pattern.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Vec<MigrationDescriptor>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::MissingMigrationsFolder(dir.to_path_buf()));
        }

        let mut migrations = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() || !Self::is_candidate(entry.path()) {
                continue;
            }
            migrations.push(MigrationDescriptor::from_path(entry.path())?);
        }

        migrations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
        for pair in migrations.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(Error::DuplicateMigrationVersion {
                    version: pair[0].version,
                    first: pair[0].path.clone(),
                    second: pair[1].path.clone(),
                });
            }
        }

        log::debug!(
            "Discovered {} fixture migrations in {}",
            migrations.len(),
            dir.display()
        );
        Ok(migrations)
    }

    fn is_candidate(path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        filename.starts_with(|c: char| c.is_ascii_digit())
            && filename.contains('_')
            && MIGRATION_EXTENSIONS.contains(&extension)
    }

    /// Version for a new migration: the current UTC time as `YYYYMMDDHHMMSS`
    pub fn new_migration_version() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    /// Write a new SQL migration template into `dir`
    pub fn create_migration(dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let name = inflection::to_snake_case(name.trim());
        if name.is_empty() {
            return Err(Error::invalid_config("Migration name cannot be empty"));
        }

        let path = dir.join(format!("{}_{}.sql", Self::new_migration_version(), name));
        let descriptor = MigrationDescriptor::from_path(&path)?;

        if dir.is_dir() {
            if let Some(existing) = Self::discover(dir)?
                .into_iter()
                .find(|m| m.name == descriptor.name)
            {
                return Err(Error::invalid_config(format!(
                    "Another migration is already named {}: {}",
                    descriptor.name,
                    existing.path.display()
                )));
            }
        }

        let template = format!(
            r#"-- Up
-- Fixture migration: {}
-- Created: {}
--
-- Reference existing fixtures by label, e.g.
-- UPDATE levels SET unlocked = 1 WHERE id = {{{{levels.easy}}}};

-- Down
-- Optionally reverse the changes made above
"#,
            descriptor.name,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        fs::create_dir_all(dir)?;
        fs::write(&path, template)?;
        log::info!("Created fixture migration {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_descriptor_from_path() {
        let descriptor =
            MigrationDescriptor::from_path("fixture_migrations/20230206133547_add_green_turtle.rs")
                .unwrap();
        assert_eq!(descriptor.version, 20230206133547);
        assert_eq!(descriptor.name, "add_green_turtle");
        assert_eq!(descriptor.type_name(), "AddGreenTurtle");
        assert_eq!(descriptor.extension(), "rs");
    }

    #[test]
    fn test_discover_sorts_recursively() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "20_second.sql");
        touch(temp.path(), "nested/10_first.rs");
        touch(temp.path(), "README.md");
        touch(temp.path(), "helpers.rs");

        let migrations = MigrationCatalog::discover(temp.path()).unwrap();
        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![10, 20]);
    }

    #[test]
    fn test_illegal_name_fails_discovery() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "10_first.sql");
        touch(temp.path(), "20_AddTurtle.sql");

        let err = MigrationCatalog::discover(temp.path()).unwrap_err();
        assert!(matches!(err, Error::IllegalMigrationName(ref p) if p.ends_with("20_AddTurtle.sql")));
    }

    #[test]
    fn test_version_overflow_is_illegal() {
        let err = MigrationDescriptor::from_path("99999999999999999999_huge.sql").unwrap_err();
        assert!(matches!(err, Error::IllegalMigrationName(_)));
    }

    #[test]
    fn test_duplicate_versions_are_rejected() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "10_first.sql");
        touch(temp.path(), "10_other.rs");

        let err = MigrationCatalog::discover(temp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateMigrationVersion { version: 10, .. }));
    }

    #[test]
    fn test_missing_folder() {
        let temp = TempDir::new().unwrap();
        let err = MigrationCatalog::discover(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::MissingMigrationsFolder(_)));
    }

    #[test]
    fn test_new_migration_version_format() {
        let version = MigrationCatalog::new_migration_version();
        assert_eq!(version.len(), 14);
        assert!(version.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_create_migration() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("fixture_migrations");

        let path = MigrationCatalog::create_migration(&dir, "AddGreenTurtle").unwrap();
        let descriptor = MigrationDescriptor::from_path(&path).unwrap();
        assert_eq!(descriptor.name, "add_green_turtle");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("-- Up"));
        assert!(contents.contains("-- Down"));
        assert!(contents.contains("{{levels.easy}}"));

        assert!(MigrationCatalog::create_migration(&dir, "add_green_turtle").is_err());
        assert!(MigrationCatalog::create_migration(&dir, "Add Turtle!").is_err());
    }
}
