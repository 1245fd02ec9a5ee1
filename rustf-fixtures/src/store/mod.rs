//! Record stores: the scratch database a fixture run works against
//!
//! The engine never talks to a database directly. Migrations, the fixture
//! loader and the fixture set builder all go through [`RecordStore`], which
//! knows the host application's [`ModelCatalog`] and exposes row-level
//! operations keyed by physical table name.

pub mod memory;
pub mod sqlite;
pub mod value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use value::SqlValue;

use crate::error::{Error, Result};
use crate::models::ModelCatalog;
use async_trait::async_trait;
use indexmap::IndexMap;

/// Column values of one row, in column order
pub type Row = IndexMap<String, SqlValue>;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// A stored row with its primary key pulled out
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub values: Row,
}

impl Record {
    pub fn new(id: i64, values: Row) -> Self {
        Self { id, values }
    }

    /// Column value, `None` when the column is not part of the row
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// Column value as text, `None` for missing or NULL columns
    pub fn get_str(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SqlValue::as_string)
    }

    /// Column value as integer, `None` for missing or NULL columns
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }
}

/// Row-level access to the scratch database
///
/// Implementations must return records of [`all`](RecordStore::all) in
/// ascending primary key order so that fixture output is deterministic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of this store, used in log output
    fn name(&self) -> &str;

    /// Model catalog describing the tables of this store
    fn models(&self) -> &ModelCatalog;

    /// Current schema version of the database
    async fn schema_version(&self) -> Result<i64>;

    /// Drop all data and recreate empty tables
    async fn reset(&self) -> Result<()>;

    /// Insert a row and return its primary key
    ///
    /// The row's own primary key is used when present. Missing `created_at`
    /// and `updated_at` values are filled with the current time.
    async fn insert(&self, table: &str, row: Row) -> Result<i64>;

    /// Apply `changes` to the row with primary key `id`
    async fn update(&self, table: &str, id: i64, changes: Row) -> Result<()>;

    /// Delete a row, returning whether it existed
    async fn delete(&self, table: &str, id: i64) -> Result<bool>;

    async fn find(&self, table: &str, id: i64) -> Result<Option<Record>>;

    /// All rows of a table ordered by primary key
    async fn all(&self, table: &str) -> Result<Vec<Record>>;

    /// Execute raw SQL, returning the number of affected rows
    ///
    /// Stores without an SQL engine reject this.
    async fn execute(&self, sql: &str) -> Result<u64> {
        let _ = sql;
        Err(Error::database(format!(
            "Store '{}' does not execute SQL",
            self.name()
        )))
    }
}

/// Fill missing creation and update timestamps for tables that declare them
pub(crate) fn stamp_insert(models: &ModelCatalog, table: &str, row: &mut Row) {
    let columns = models.table_columns(table);
    let now = SqlValue::from(chrono::Utc::now());
    for column in [CREATED_AT, UPDATED_AT] {
        let missing = row.get(column).map_or(true, SqlValue::is_null);
        if columns.contains_key(column) && missing {
            row.insert(column.to_string(), now.clone());
        }
    }
}

/// Touch `updated_at` unless the changes set it explicitly
pub(crate) fn stamp_update(models: &ModelCatalog, table: &str, changes: &mut Row) {
    if models.table_columns(table).contains_key(UPDATED_AT) && !changes.contains_key(UPDATED_AT)
    {
        changes.insert(UPDATED_AT.to_string(), SqlValue::from(chrono::Utc::now()));
    }
}
