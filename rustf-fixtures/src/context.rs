//! Deciding whether and how to run fixture migrations

use crate::config::{Configuration, ProjectLayout};
use crate::error::Result;
use crate::ledger::{VersionLedger, VersionState};
use crate::migrations::{MigrationCatalog, MigrationDescriptor, MigrationDirection, MigrationRegistry};
use crate::migrator::{MigrationPlan, MigrationReport, Migrator};
use crate::store::RecordStore;

/// Result of [`MigrationContext::migrate`] and [`MigrationContext::rollback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NothingPending,
    NothingToRollback,
    Migrated(MigrationReport),
}

impl MigrationOutcome {
    /// User-facing summary line
    pub fn message(&self) -> String {
        match self {
            MigrationOutcome::NothingPending => "No fixture migrations pending.".to_string(),
            MigrationOutcome::NothingToRollback => "No migration to rollback.".to_string(),
            MigrationOutcome::Migrated(report) => {
                let target = if report.promoted {
                    format!("written to {}", report.output_dir.display())
                } else {
                    format!("left in {} (overwrite disabled)", report.output_dir.display())
                };
                format!(
                    "Migrated {} ({} migrations) to fixture version {}: {} fixtures {}",
                    report.direction,
                    report.migrated.len(),
                    report.target_version,
                    report.written_fixtures,
                    target
                )
            }
        }
    }

    pub fn report(&self) -> Option<&MigrationReport> {
        match self {
            MigrationOutcome::Migrated(report) => Some(report),
            _ => None,
        }
    }
}

/// Everything known before a run: configuration, recorded versions,
/// the current schema version and the migration catalog
pub struct MigrationContext<'a> {
    layout: ProjectLayout,
    config: Configuration,
    store: &'a dyn RecordStore,
    registry: &'a MigrationRegistry,
    ledger: VersionLedger,
    state: VersionState,
    schema_version: i64,
    migrations: Vec<MigrationDescriptor>,
}

impl<'a> MigrationContext<'a> {
    /// Read the project's configuration, ledger and migrations
    pub async fn build(
        layout: ProjectLayout,
        store: &'a dyn RecordStore,
        registry: &'a MigrationRegistry,
    ) -> Result<MigrationContext<'a>> {
        let config = layout.load_configuration()?;
        Self::with_configuration(layout, config, store, registry).await
    }

    /// Like [`build`](Self::build) with an already loaded configuration
    pub async fn with_configuration(
        layout: ProjectLayout,
        config: Configuration,
        store: &'a dyn RecordStore,
        registry: &'a MigrationRegistry,
    ) -> Result<MigrationContext<'a>> {
        let ledger = VersionLedger::new(layout.ledger_path());
        let state = ledger.load()?;
        let migrations = MigrationCatalog::discover(layout.migrations_dir())?;
        let schema_version = store.schema_version().await?;

        log::debug!(
            "Fixture version {} (schema {}), current schema {}, {} migrations",
            state.version,
            state.schema_version,
            schema_version,
            migrations.len()
        );

        Ok(Self {
            layout,
            config,
            store,
            registry,
            ledger,
            state,
            schema_version,
            migrations,
        })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Versions recorded by the last promoted run
    pub fn version_state(&self) -> VersionState {
        self.state
    }

    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    pub fn migrations(&self) -> &[MigrationDescriptor] {
        &self.migrations
    }

    /// Migrations newer than the recorded version, ascending
    pub fn pending_migrations(&self) -> Vec<&MigrationDescriptor> {
        self.migrations
            .iter()
            .filter(|m| m.version > self.state.version)
            .collect()
    }

    /// Migrations at or below the recorded version, ascending
    pub fn executed_migrations(&self) -> Vec<&MigrationDescriptor> {
        self.migrations
            .iter()
            .filter(|m| m.version <= self.state.version)
            .collect()
    }

    pub fn up_target_version(&self) -> i64 {
        self.pending_migrations()
            .iter()
            .map(|m| m.version)
            .max()
            .unwrap_or(self.state.version)
    }

    /// Version left after rolling back the last executed migration
    pub fn down_target_version(&self) -> i64 {
        let executed = self.executed_migrations();
        if executed.len() < 2 {
            return 0;
        }
        executed[executed.len() - 2].version
    }

    /// Plan for `migrate`, `None` when there is nothing to do
    pub fn plan_migrate(&self) -> Option<MigrationPlan> {
        let pending = self.pending_migrations();
        let schema_changed = self.state.schema_version != self.schema_version;

        if pending.is_empty() && !schema_changed && !self.config.rename {
            return None;
        }

        Some(MigrationPlan {
            direction: MigrationDirection::Up,
            migrations: pending.into_iter().cloned().collect(),
            target_version: self.up_target_version(),
            target_schema_version: self.schema_version,
        })
    }

    /// Plan for `rollback`, `None` when nothing was executed
    pub fn plan_rollback(&self) -> Option<MigrationPlan> {
        let last = self.executed_migrations().last().copied()?.clone();
        Some(MigrationPlan {
            direction: MigrationDirection::Down,
            migrations: vec![last],
            target_version: self.down_target_version(),
            target_schema_version: self.schema_version,
        })
    }

    pub async fn migrate(&self) -> Result<MigrationOutcome> {
        match self.plan_migrate() {
            Some(plan) => self.run(&plan).await,
            None => {
                log::info!("No fixture migrations pending.");
                Ok(MigrationOutcome::NothingPending)
            }
        }
    }

    pub async fn rollback(&self) -> Result<MigrationOutcome> {
        match self.plan_rollback() {
            Some(plan) => self.run(&plan).await,
            None => {
                log::info!("No migration to rollback.");
                Ok(MigrationOutcome::NothingToRollback)
            }
        }
    }

    async fn run(&self, plan: &MigrationPlan) -> Result<MigrationOutcome> {
        let migrator = Migrator::new(
            &self.layout,
            &self.config,
            self.store,
            self.registry,
            &self.ledger,
        );
        let report = migrator.migrate(plan).await?;
        Ok(MigrationOutcome::Migrated(report))
    }
}
