//! Fixture migrations
//!
//! A fixture migration is a versioned script that changes test data. Files
//! live in `tests/fixture_migrations` and are named `<version>_<name>.<ext>`:
//!
//! - `.sql` files run against the scratch database. The part before the
//!   `-- Down` marker migrates up, the part after it migrates down. Existing
//!   fixtures can be referenced by label with `{{levels.easy}}`.
//! - `.rs` files name a Rust migration registered with
//!   [`MigrationRegistry::register`] under the PascalCase form of the file
//!   name (`20230206133547_add_green_turtle.rs` → `AddGreenTurtle`).
//!
//! ```rust,ignore
//! struct AddGreenTurtle;
//!
//! #[async_trait]
//! impl MigrationUnit for AddGreenTurtle {
//!     async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
//!         let level = env.fixture_id("levels", "hard")?;
//!         let mut row = Row::new();
//!         row.insert("name".into(), "greenie".into());
//!         row.insert("type".into(), "Character::Turtle::Green".into());
//!         row.insert("level_id".into(), level.into());
//!         env.store().insert("character_turtles", row).await?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod catalog;
pub mod environment;
pub mod proxy;
pub mod registry;
pub mod sql;

pub use catalog::{MigrationCatalog, MigrationDescriptor, MIGRATION_EXTENSIONS};
pub use environment::{MigrationEnvironment, RecordSet};
pub use proxy::MigrationProxy;
pub use registry::MigrationRegistry;
pub use sql::SqlMigration;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;

/// Direction a migration run goes in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// One fixture migration
///
/// Units are built fresh for every run and dropped when it ends.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Name reported in errors and logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()>;

    async fn down(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        let _ = env;
        Err(Error::IrreversibleMigration(self.name().to_string()))
    }
}
