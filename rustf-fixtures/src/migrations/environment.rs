//! What a migration sees while it runs

use crate::error::{Error, Result};
use crate::store::{Record, RecordStore};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static FIXTURE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\.([^}\s]+)\s*\}\}")
        .expect("MigrationEnvironment: Invalid fixture reference regex")
});

/// Labels of one fixture file loaded before the run, e.g. `levels`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub accessor: String,
    pub table: String,
    pub labels: BTreeMap<String, i64>,
}

impl RecordSet {
    pub fn new(accessor: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            accessor: accessor.into(),
            table: table.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Primary key of the fixture labeled `label`
    pub fn id(&self, label: &str) -> Option<i64> {
        self.labels.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Capabilities handed to a migration for the duration of one run
pub struct MigrationEnvironment<'a> {
    store: &'a dyn RecordStore,
    accessors: &'a BTreeMap<String, RecordSet>,
}

impl<'a> MigrationEnvironment<'a> {
    pub fn new(store: &'a dyn RecordStore, accessors: &'a BTreeMap<String, RecordSet>) -> Self {
        Self { store, accessors }
    }

    /// The scratch database
    pub fn store(&self) -> &'a dyn RecordStore {
        self.store
    }

    /// Fixture set loaded under accessor `name`, e.g. `character_turtles`
    pub fn resolve_accessor(&self, name: &str) -> Result<&'a RecordSet> {
        self.accessors
            .get(name)
            .ok_or_else(|| Error::unknown_fixture(format!("no fixture accessor named '{}'", name)))
    }

    pub fn accessors(&self) -> impl Iterator<Item = &'a RecordSet> {
        self.accessors.values()
    }

    /// Primary key of a pre-existing fixture
    pub fn fixture_id(&self, accessor: &str, label: &str) -> Result<i64> {
        self.resolve_accessor(accessor)?
            .id(label)
            .ok_or_else(|| Error::unknown_fixture(format!("{}.{}", accessor, label)))
    }

    /// Current row of a pre-existing fixture
    pub async fn fixture(&self, accessor: &str, label: &str) -> Result<Record> {
        let set = self.resolve_accessor(accessor)?;
        let id = self.fixture_id(accessor, label)?;
        self.store.find(&set.table, id).await?.ok_or_else(|| {
            Error::unknown_fixture(format!("{}.{} was deleted", accessor, label))
        })
    }

    /// Execute raw SQL against the scratch database
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.store.execute(sql).await
    }

    /// Replace every `{{accessor.label}}` in `sql` with the fixture's primary key
    pub fn expand_fixture_references(&self, sql: &str) -> Result<String> {
        let mut failure = None;
        let expanded = FIXTURE_REFERENCE.replace_all(sql, |caps: &Captures<'_>| {
            match self.fixture_id(&caps[1], &caps[2]) {
                Ok(id) => id.to_string(),
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }
}
