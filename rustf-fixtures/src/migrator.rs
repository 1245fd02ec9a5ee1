//! One fixture migration run
//!
//! A run resets the scratch store, loads the current fixtures, applies the
//! planned migrations and regenerates every fixture file from what the
//! store holds afterwards:
//!
//! 1. refuse to overwrite when more than one fixture directory has content
//! 2. reset the store and load the existing fixtures
//! 3. run each migration in the planned direction
//! 4. build the fixture set and write it into `tmp/fixtures`
//! 5. copy attachment files along
//! 6. with `overwrite`, swap the scratch directory in and save the ledger

use crate::config::{Configuration, ProjectLayout};
use crate::error::{Error, Result};
use crate::fixtures::writer::is_non_empty_dir;
use crate::fixtures::{FixtureLoader, FixtureSetBuilder, FixtureSnapshot, FixtureWriter, Labeler};
use crate::ledger::{VersionLedger, VersionState};
use crate::migrations::{
    MigrationDescriptor, MigrationDirection, MigrationEnvironment, MigrationProxy,
    MigrationRegistry,
};
use crate::store::RecordStore;
use std::path::PathBuf;

/// What a run will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub direction: MigrationDirection,
    pub migrations: Vec<MigrationDescriptor>,
    /// Fixture version recorded after the run
    pub target_version: i64,
    /// Schema version recorded after the run
    pub target_schema_version: i64,
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub direction: MigrationDirection,
    /// Versions of the migrations that ran, in order
    pub migrated: Vec<i64>,
    pub target_version: i64,
    pub target_schema_version: i64,
    pub loaded_fixtures: usize,
    pub written_files: Vec<PathBuf>,
    pub written_fixtures: usize,
    /// Where the fixtures ended up: the live directory or the scratch directory
    pub output_dir: PathBuf,
    pub promoted: bool,
}

/// Executes a [`MigrationPlan`]
pub struct Migrator<'a> {
    layout: &'a ProjectLayout,
    config: &'a Configuration,
    store: &'a dyn RecordStore,
    registry: &'a MigrationRegistry,
    ledger: &'a VersionLedger,
}

impl<'a> Migrator<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        config: &'a Configuration,
        store: &'a dyn RecordStore,
        registry: &'a MigrationRegistry,
        ledger: &'a VersionLedger,
    ) -> Self {
        Self {
            layout,
            config,
            store,
            registry,
            ledger,
        }
    }

    pub async fn migrate(&self, plan: &MigrationPlan) -> Result<MigrationReport> {
        let fixture_dirs = self.layout.fixture_dirs(self.config);
        self.check_fixture_sources(&fixture_dirs)?;
        let live_dir = Self::live_dir(&fixture_dirs)
            .unwrap_or_else(|| self.layout.default_fixtures_dir());

        log::info!(
            "Running {} fixture migrations {} on '{}'",
            plan.migrations.len(),
            plan.direction,
            self.store.name()
        );

        self.store.reset().await?;
        let models = self.store.models();
        let loaded = FixtureLoader::new(models)
            .load(self.store, &fixture_dirs)
            .await?;

        let env = MigrationEnvironment::new(self.store, &loaded.accessors);
        let mut migrated = Vec::with_capacity(plan.migrations.len());
        for descriptor in &plan.migrations {
            MigrationProxy::new(descriptor.clone())
                .migrate(plan.direction, self.registry, &env)
                .await?;
            migrated.push(descriptor.version);
        }

        let snapshot = FixtureSnapshot::capture(self.store).await?;
        let labeler = Labeler::new(
            &loaded.mapping,
            &self.config.label_templates,
            self.config.rename,
        );
        let set = FixtureSetBuilder::new(models, self.config, &labeler).build(&snapshot)?;
        let written_fixtures = set.values().map(|data| data.records.len()).sum();

        let scratch_dir = self.layout.scratch_dir();
        let mut written_files = FixtureWriter::write(&set, &scratch_dir)?;
        FixtureWriter::copy_attachments(&live_dir, &scratch_dir, &self.config.attachment_folders)?;

        let output_dir = if self.config.overwrite {
            FixtureWriter::promote(&scratch_dir, &live_dir)?;
            written_files = written_files
                .into_iter()
                .filter_map(|path| path.strip_prefix(&scratch_dir).ok().map(|p| live_dir.join(p)))
                .collect();
            self.ledger.save(VersionState::new(
                plan.target_version,
                plan.target_schema_version,
            ))?;
            live_dir
        } else {
            log::info!(
                "Overwrite disabled; regenerated fixtures left in {}",
                scratch_dir.display()
            );
            scratch_dir
        };

        log::info!(
            "Wrote {} fixtures in {} files (fixture version {})",
            written_fixtures,
            written_files.len(),
            plan.target_version
        );

        Ok(MigrationReport {
            direction: plan.direction,
            migrated,
            target_version: plan.target_version,
            target_schema_version: plan.target_schema_version,
            loaded_fixtures: loaded.record_count(),
            written_files,
            written_fixtures,
            output_dir,
            promoted: self.config.overwrite,
        })
    }

    /// Directory the fixtures are read from and promoted into: the one with
    /// content, else the first configured one
    fn live_dir(fixture_dirs: &[PathBuf]) -> Option<PathBuf> {
        fixture_dirs
            .iter()
            .find(|dir| is_non_empty_dir(dir))
            .or_else(|| fixture_dirs.first())
            .cloned()
    }

    fn check_fixture_sources(&self, fixture_dirs: &[PathBuf]) -> Result<()> {
        if !self.config.overwrite {
            return Ok(());
        }
        let non_empty: Vec<PathBuf> = fixture_dirs
            .iter()
            .filter(|dir| is_non_empty_dir(dir))
            .cloned()
            .collect();
        if non_empty.len() > 1 {
            return Err(Error::AmbiguousFixtureSource(non_empty));
        }
        Ok(())
    }
}
