use super::discover_layout;
use anyhow::Result;
use rustf_fixtures::{MigrationCatalog, VersionLedger};
use std::path::PathBuf;

/// Print recorded versions and every migration with its state
///
/// Works without a database, so the schema version shown is the recorded one.
pub async fn run(project_path: PathBuf, suite: Option<PathBuf>) -> Result<()> {
    let layout = discover_layout(project_path, suite)?;
    let state = VersionLedger::new(layout.ledger_path()).load()?;
    let migrations = MigrationCatalog::discover(layout.migrations_dir())?;

    println!("Fixture version: {}", state.version);
    println!("Schema version:  {}", state.schema_version);
    println!();

    if migrations.is_empty() {
        println!("No fixture migrations in {}", layout.migrations_dir().display());
        return Ok(());
    }

    let mut pending = 0;
    for migration in &migrations {
        let status = if migration.version <= state.version {
            "up"
        } else {
            pending += 1;
            "pending"
        };
        println!(
            "{:>8}  {}  {}",
            status,
            migration.version,
            migration.type_name()
        );
    }

    println!();
    println!("{} of {} migrations pending", pending, migrations.len());
    Ok(())
}
