//! RustF Fixtures - versioned migrations for YAML test fixtures
//!
//! Fixture files drift away from the schema and from each other as an
//! application grows. This crate treats them like a database:
//! - fixture migrations live next to the test suite and run in version order
//! - each run loads the current fixtures into a scratch store, applies the
//!   pending scripts and writes every fixture file back out
//! - labels survive regeneration, references are written as labels
//! - a small ledger records which version the fixture files correspond to

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod config;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod ledger;
pub mod migrations;
pub mod migrator;
pub mod models;
pub mod store;

pub use config::{Configuration, DatabaseConfig, ProjectLayout};
pub use context::{MigrationContext, MigrationOutcome};
pub use error::{Error, Result};
pub use fixtures::{identify, FixtureSet, FixtureValue};
pub use ledger::{VersionLedger, VersionState};
pub use migrations::{
    MigrationCatalog, MigrationDescriptor, MigrationDirection, MigrationEnvironment,
    MigrationRegistry, MigrationUnit,
};
pub use migrator::{MigrationPlan, MigrationReport, Migrator};
pub use models::ModelCatalog;
pub use store::{MemoryStore, Record, RecordStore, SqlValue, SqliteStore};

// Re-export for MigrationUnit implementations
pub use async_trait::async_trait;
