use anyhow::Result;
use rustf_fixtures::ProjectLayout;
use std::fs;
use std::path::PathBuf;

const CONFIG_TEMPLATE: &str = r#"# Fixture migration settings
#
# Label templates per table. Attributes are interpolated with %{column};
# DEFAULT keeps the <table>_<id> form.
# label:
#   levels: "%{difficulty}"
#
# Write regenerated fixtures over the live ones and update the version file
overwrite: true
#
# Compute every label from the templates instead of keeping existing ones
rename: false
#
# Tables that never get a fixture file
# ignore:
#   - schema_migrations
#
# Fixture directories relative to the project root (default: tests/fixtures)
# fixture_paths:
#   - tests/fixtures
#
# Scratch database used while migrating
database:
  schema: db/schema.sql
  models: db/models.yml
"#;

pub async fn run(project_path: PathBuf, suite: Option<PathBuf>, force: bool) -> Result<()> {
    let mut layout = ProjectLayout::new(project_path);
    if let Some(suite) = suite {
        layout = layout.with_suite(suite);
    }
    log::info!("Initializing fixture migrations in {}", layout.suite_dir().display());

    for dir in [layout.migrations_dir(), layout.default_fixtures_dir()] {
        if dir.is_dir() {
            println!("✅ Found {}", dir.display());
        } else {
            fs::create_dir_all(&dir)?;
            println!("📁 Created {}", dir.display());
        }
    }

    let config_path = layout.config_path();
    if config_path.exists() && !force {
        println!(
            "⚠️  {} already exists (use --force to overwrite)",
            config_path.display()
        );
    } else {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
        println!("📝 Wrote {}", config_path.display());
    }

    println!("\nNext: create a migration with `rustf-fixtures new <name>`");
    Ok(())
}
