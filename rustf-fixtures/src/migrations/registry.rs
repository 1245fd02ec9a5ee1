//! Resolution of migration descriptors into runnable units

use super::{MigrationDescriptor, MigrationUnit, SqlMigration};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

type MigrationFactory = Box<dyn Fn() -> Box<dyn MigrationUnit> + Send + Sync>;

/// Builds a fresh [`MigrationUnit`] for each descriptor that runs
///
/// `.sql` migrations are read from disk. Any other file stands for a Rust
/// migration registered under the descriptor's PascalCase type name.
#[derive(Default)]
pub struct MigrationRegistry {
    factories: HashMap<String, MigrationFactory>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Rust migration under `type_name`, e.g. `AddGreenTurtle`
    pub fn register<F, M>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: MigrationUnit + 'static,
    {
        let type_name = type_name.into();
        log::debug!("Registered fixture migration {}", type_name);
        self.factories.insert(
            type_name,
            Box::new(move || -> Box<dyn MigrationUnit> { Box::new(factory()) }),
        );
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F, M>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: MigrationUnit + 'static,
    {
        self.register(type_name, factory);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Construct the unit for `descriptor`
    pub fn resolve(&self, descriptor: &MigrationDescriptor) -> Result<Box<dyn MigrationUnit>> {
        let type_name = descriptor.type_name();

        if descriptor.extension() == "sql" {
            let migration = SqlMigration::from_file(&type_name, &descriptor.path).map_err(|e| {
                Error::migration_load(&type_name, descriptor.version, e.to_string())
            })?;
            return Ok(Box::new(migration));
        }

        let factory = self.factories.get(&type_name).ok_or_else(|| {
            Error::migration_load(
                &type_name,
                descriptor.version,
                format!(
                    "no migration registered as {} for {}",
                    type_name,
                    descriptor.basename()
                ),
            )
        })?;
        Ok(factory())
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("MigrationRegistry")
            .field("factories", &names)
            .finish()
    }
}
