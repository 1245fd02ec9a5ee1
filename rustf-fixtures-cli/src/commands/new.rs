use super::discover_layout;
use anyhow::Result;
use rustf_fixtures::MigrationCatalog;
use std::path::PathBuf;

pub async fn run(project_path: PathBuf, suite: Option<PathBuf>, name: String) -> Result<()> {
    let layout = discover_layout(project_path, suite)?;
    let path = MigrationCatalog::create_migration(layout.migrations_dir(), &name)?;
    println!("📝 Created {}", path.display());
    Ok(())
}
