pub mod init;
pub mod migrate;
pub mod new;
pub mod status;

use anyhow::{Context, Result};
use rustf_fixtures::{
    Configuration, MigrationRegistry, ModelCatalog, ProjectLayout, SqliteStore,
};
use std::path::PathBuf;

/// Layout of an existing project, failing when the suite folder is missing
pub fn discover_layout(project_path: PathBuf, suite: Option<PathBuf>) -> Result<ProjectLayout> {
    let layout = ProjectLayout::discover(project_path, suite.as_deref())?;
    log::debug!("Using test suite at {}", layout.suite_dir().display());
    Ok(layout)
}

/// Scratch SQLite database built from the configured schema and model catalog
pub async fn open_store(layout: &ProjectLayout, config: &Configuration) -> Result<SqliteStore> {
    let models_path = layout.resolve(&config.database.models);
    let models = ModelCatalog::load(&models_path)
        .with_context(|| format!("Failed to load model catalog {}", models_path.display()))?;

    let schema_path = layout.resolve(&config.database.schema);
    let store = SqliteStore::from_schema_file(models, &schema_path)
        .await
        .with_context(|| format!("Failed to build scratch database from {}", schema_path.display()))?;
    Ok(store)
}

/// Rust migrations need the library API; the command line runs SQL migrations
pub fn registry() -> MigrationRegistry {
    MigrationRegistry::new()
}
