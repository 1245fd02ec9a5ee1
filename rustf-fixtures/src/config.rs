//! Run configuration and project layout
//!
//! The configuration document lives at `tests/rustf_fixtures.yml`:
//!
//! ```yaml
//! label:
//!   levels: "%{name}_%{difficulty}"
//!   character_turtles: DEFAULT
//! overwrite: true
//! rename: false
//! ignore:
//!   - weaponizable_weapons
//! database:
//!   schema: db/schema.sql
//!   models: db/models.yml
//! ```
//!
//! Every key is optional. `RUSTF_FIXTURES_OVERWRITE` and
//! `RUSTF_FIXTURES_RENAME` override the matching keys.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUITE_DIR: &str = "tests";
pub const MIGRATIONS_DIR: &str = "fixture_migrations";
pub const CONFIG_FILE: &str = "rustf_fixtures.yml";
pub const LEDGER_FILE: &str = ".rustf_fixtures_versions.yml";
pub const FIXTURES_DIR: &str = "fixtures";
pub const SCRATCH_DIR: &str = "tmp/fixtures";

/// Template value selecting the `<table>_<id>` label
pub const DEFAULT_LABEL: &str = "DEFAULT";

/// Immutable settings for one run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Configuration {
    /// Label templates keyed by table name
    #[serde(default, rename = "label")]
    pub label_templates: BTreeMap<String, String>,

    /// Promote regenerated fixtures and update the ledger
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,

    /// Ignore existing labels and compute every label fresh
    #[serde(default)]
    pub rename: bool,

    #[serde(default, rename = "ignore")]
    pub ignored_tables: BTreeSet<String>,

    /// Fixture directories, relative to the project root
    ///
    /// Empty means `tests/fixtures`.
    #[serde(default)]
    pub fixture_paths: Vec<PathBuf>,

    /// Attachment folders inside the fixture directory copied along unchanged
    #[serde(default = "default_attachment_folders")]
    pub attachment_folders: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Where the scratch database gets its schema and model catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_schema_path")]
    pub schema: PathBuf,

    #[serde(default = "default_models_path")]
    pub models: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            schema: default_schema_path(),
            models: default_models_path(),
        }
    }
}

fn default_overwrite() -> bool {
    true
}

fn default_attachment_folders() -> Vec<String> {
    vec![
        "files".to_string(),
        "active_storage".to_string(),
        "action_text".to_string(),
    ]
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("db/schema.sql")
}

fn default_models_path() -> PathBuf {
    PathBuf::from("db/models.yml")
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            label_templates: BTreeMap::new(),
            overwrite: default_overwrite(),
            rename: false,
            ignored_tables: BTreeSet::new(),
            fixture_paths: Vec::new(),
            attachment_folders: default_attachment_folders(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Configuration {
    /// Parse a configuration document; an empty document yields the defaults
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Load configuration from a YAML file
    ///
    /// A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_yaml_str(&contents).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(overwrite) = env::var("RUSTF_FIXTURES_OVERWRITE") {
            self.overwrite = parse_flag("RUSTF_FIXTURES_OVERWRITE", &overwrite)?;
        }
        if let Ok(rename) = env::var("RUSTF_FIXTURES_RENAME") {
            self.rename = parse_flag("RUSTF_FIXTURES_RENAME", &rename)?;
        }
        Ok(())
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_label(mut self, table: impl Into<String>, template: impl Into<String>) -> Self {
        self.label_templates.insert(table.into(), template.into());
        self
    }

    pub fn with_ignored(mut self, table: impl Into<String>) -> Self {
        self.ignored_tables.insert(table.into());
        self
    }

    /// Label template configured for `table`, if any
    pub fn label_template(&self, table: &str) -> Option<&str> {
        self.label_templates.get(table).map(String::as_str)
    }

    pub fn is_ignored(&self, table: &str) -> bool {
        self.ignored_tables.contains(table)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_config(format!(
            "Invalid {} value: {}",
            name, value
        ))),
    }
}

/// Filesystem locations of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    suite: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at `root` with the suite folder at `<root>/tests`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let suite = root.join(SUITE_DIR);
        Self { root, suite }
    }

    /// Use a different suite folder, relative paths resolved against the root
    pub fn with_suite(mut self, suite: impl AsRef<Path>) -> Self {
        self.suite = self.resolve(suite);
        self
    }

    /// Layout for an existing project, failing when the suite folder is absent
    pub fn discover(root: impl Into<PathBuf>, suite: Option<&Path>) -> Result<Self> {
        let mut layout = Self::new(root);
        if let Some(suite) = suite {
            layout = layout.with_suite(suite);
        }
        if !layout.suite.is_dir() {
            return Err(Error::MissingSuiteFolder(layout.suite));
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suite_dir(&self) -> &Path {
        &self.suite
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.suite.join(MIGRATIONS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.suite.join(CONFIG_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.suite.join(LEDGER_FILE)
    }

    pub fn default_fixtures_dir(&self) -> PathBuf {
        self.suite.join(FIXTURES_DIR)
    }

    /// Fresh output directory for regenerated fixtures
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    /// Resolve a project-relative path
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Fixture directories of `config`, the first one being the promotion target
    pub fn fixture_dirs(&self, config: &Configuration) -> Vec<PathBuf> {
        if config.fixture_paths.is_empty() {
            vec![self.default_fixtures_dir()]
        } else {
            config.fixture_paths.iter().map(|p| self.resolve(p)).collect()
        }
    }

    /// Read the configuration file and apply environment overrides
    pub fn load_configuration(&self) -> Result<Configuration> {
        let mut config = Configuration::from_file(self.config_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }
}
