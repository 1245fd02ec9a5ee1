use super::{discover_layout, open_store, registry};
use anyhow::Result;
use rustf_fixtures::{MigrationContext, MigrationOutcome};
use std::path::PathBuf;

pub async fn run(project_path: PathBuf, suite: Option<PathBuf>) -> Result<()> {
    let layout = discover_layout(project_path, suite)?;
    let config = layout.load_configuration()?;
    let store = open_store(&layout, &config).await?;
    let registry = registry();

    let context = MigrationContext::with_configuration(layout, config, &store, &registry).await?;
    report(context.migrate().await?);
    Ok(())
}

pub async fn rollback(project_path: PathBuf, suite: Option<PathBuf>) -> Result<()> {
    let layout = discover_layout(project_path, suite)?;
    let config = layout.load_configuration()?;
    let store = open_store(&layout, &config).await?;
    let registry = registry();

    let context = MigrationContext::with_configuration(layout, config, &store, &registry).await?;
    report(context.rollback().await?);
    Ok(())
}

fn report(outcome: MigrationOutcome) {
    match &outcome {
        MigrationOutcome::Migrated(report) => {
            println!("✅ {}", outcome.message());
            for path in &report.written_files {
                println!("   {}", path.display());
            }
        }
        _ => println!("{}", outcome.message()),
    }
}
