use super::{MigrationDescriptor, MigrationDirection, MigrationEnvironment, MigrationRegistry};
use crate::error::Result;
use std::time::Instant;

/// Lazily resolved migration
///
/// Holds only the descriptor; the unit is built from the registry when the
/// migration runs and dropped right after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationProxy {
    descriptor: MigrationDescriptor,
}

impl MigrationProxy {
    pub fn new(descriptor: MigrationDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &MigrationDescriptor {
        &self.descriptor
    }

    pub fn version(&self) -> i64 {
        self.descriptor.version
    }

    /// Resolve the unit and run it in `direction`
    ///
    /// Errors raised by the unit are returned as they are.
    pub async fn migrate(
        &self,
        direction: MigrationDirection,
        registry: &MigrationRegistry,
        env: &MigrationEnvironment<'_>,
    ) -> Result<()> {
        let unit = registry.resolve(&self.descriptor)?;
        log::info!(
            "== {} {}: migrating {}",
            self.descriptor.version,
            self.descriptor.type_name(),
            direction
        );

        let started = Instant::now();
        match direction {
            MigrationDirection::Up => unit.up(env).await?,
            MigrationDirection::Down => unit.down(env).await?,
        }

        log::info!(
            "== {} {}: migrated ({:.4}s)",
            self.descriptor.version,
            self.descriptor.type_name(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

impl From<MigrationDescriptor> for MigrationProxy {
    fn from(descriptor: MigrationDescriptor) -> Self {
        Self::new(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::migrations::{MigrationUnit, RecordSet};
    use crate::models::ModelCatalog;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Explodes;

    #[async_trait]
    impl MigrationUnit for Explodes {
        async fn up(&self, _env: &MigrationEnvironment<'_>) -> Result<()> {
            Err(Error::database("boom"))
        }
    }

    #[tokio::test]
    async fn test_unit_errors_propagate_unchanged() {
        let store = MemoryStore::new(ModelCatalog::default(), 0);
        let accessors: BTreeMap<String, RecordSet> = BTreeMap::new();
        let env = MigrationEnvironment::new(&store, &accessors);
        let registry = MigrationRegistry::new().with("Explodes", || Explodes);
        let proxy = MigrationProxy::new(MigrationDescriptor::from_path("1_explodes.rs").unwrap());

        let up = proxy.migrate(MigrationDirection::Up, &registry, &env).await;
        assert!(matches!(up, Err(Error::Database(ref m)) if m == "boom"));

        let down = proxy.migrate(MigrationDirection::Down, &registry, &env).await;
        assert!(matches!(down, Err(Error::IrreversibleMigration(_))));
    }
}
