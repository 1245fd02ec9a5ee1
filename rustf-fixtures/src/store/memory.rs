//! In-process record store
//!
//! Tables come from the model catalog. Each table keeps its rows in primary
//! key order and hands out ids from a per-table counter, much like an
//! autoincrement column.

use super::{stamp_insert, stamp_update, Record, RecordStore, Row, SqlValue};
use crate::error::{Error, Result};
use crate::models::ModelCatalog;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl MemoryTable {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

/// Record store keeping every table in memory
pub struct MemoryStore {
    name: String,
    models: Arc<ModelCatalog>,
    schema_version: i64,
    tables: Mutex<BTreeMap<String, MemoryTable>>,
}

impl MemoryStore {
    /// Create a store with empty tables for every table in `models`
    pub fn new(models: impl Into<Arc<ModelCatalog>>, schema_version: i64) -> Self {
        let models = models.into();
        let tables = Self::empty_tables(&models);
        Self {
            name: "memory".to_string(),
            models,
            schema_version,
            tables: Mutex::new(tables),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn empty_tables(models: &ModelCatalog) -> BTreeMap<String, MemoryTable> {
        models
            .tables()
            .into_iter()
            .map(|table| (table, MemoryTable::new()))
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryTable>>> {
        self.tables
            .lock()
            .map_err(|_| Error::database(format!("Store '{}' is poisoned", self.name)))
    }

    fn check_columns(&self, table: &str, row: &Row) -> Result<()> {
        let columns = self.models.table_columns(table);
        if columns.is_empty() {
            return Ok(());
        }
        match row.keys().find(|column| !columns.contains_key(*column)) {
            Some(column) => Err(Error::database(format!(
                "table {} has no column named {}",
                table, column
            ))),
            None => Ok(()),
        }
    }
}

fn no_such_table(table: &str) -> Error {
    Error::database(format!("no such table: {}", table))
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> &ModelCatalog {
        &self.models
    }

    async fn schema_version(&self) -> Result<i64> {
        Ok(self.schema_version)
    }

    async fn reset(&self) -> Result<()> {
        let mut tables = self.lock()?;
        *tables = Self::empty_tables(&self.models);
        log::debug!("Reset memory store '{}' ({} tables)", self.name, tables.len());
        Ok(())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<i64> {
        self.check_columns(table, &row)?;
        stamp_insert(&self.models, table, &mut row);

        let primary_key = self.models.primary_key(table).to_string();
        let mut tables = self.lock()?;
        let data = tables.get_mut(table).ok_or_else(|| no_such_table(table))?;

        let id = match row.get(&primary_key).and_then(SqlValue::as_i64) {
            Some(id) => id,
            None => data.next_id,
        };
        if data.rows.contains_key(&id) {
            return Err(Error::database(format!(
                "UNIQUE constraint failed: {}.{}",
                table, primary_key
            )));
        }

        row.insert(primary_key, SqlValue::BigInt(id));
        data.rows.insert(id, row);
        data.next_id = data.next_id.max(id + 1);
        Ok(id)
    }

    async fn update(&self, table: &str, id: i64, mut changes: Row) -> Result<()> {
        self.check_columns(table, &changes)?;
        stamp_update(&self.models, table, &mut changes);

        let mut tables = self.lock()?;
        let data = tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
        let row = data
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::database(format!("{} record {} not found", table, id)))?;
        row.extend(changes);
        Ok(())
    }

    async fn delete(&self, table: &str, id: i64) -> Result<bool> {
        let mut tables = self.lock()?;
        let data = tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
        Ok(data.rows.remove(&id).is_some())
    }

    async fn find(&self, table: &str, id: i64) -> Result<Option<Record>> {
        let tables = self.lock()?;
        let data = tables.get(table).ok_or_else(|| no_such_table(table))?;
        Ok(data.rows.get(&id).map(|row| Record::new(id, row.clone())))
    }

    async fn all(&self, table: &str) -> Result<Vec<Record>> {
        let tables = self.lock()?;
        let data = tables.get(table).ok_or_else(|| no_such_table(table))?;
        Ok(data
            .rows
            .iter()
            .map(|(id, row)| Record::new(*id, row.clone()))
            .collect())
    }
}
