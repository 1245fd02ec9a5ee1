//! SQLite scratch database
//!
//! The database lives in memory behind a single pooled connection, so every
//! statement of a run sees the same data. [`reset`](RecordStore::reset)
//! drops every table and replays the schema script; the schema version is
//! whatever the script stores in `PRAGMA user_version`.

use super::{stamp_insert, stamp_update, Record, RecordStore, Row, SqlValue};
use crate::error::{Error, Result};
use crate::models::ModelCatalog;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use std::path::Path;
use std::sync::Arc;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Record store backed by an in-memory SQLite database
pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
    models: Arc<ModelCatalog>,
    schema_sql: String,
}

impl SqliteStore {
    /// Open a fresh in-memory database and load `schema_sql` into it
    pub async fn open(
        models: impl Into<Arc<ModelCatalog>>,
        schema_sql: impl Into<String>,
    ) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::database(format!("Failed to open SQLite scratch database: {}", e)))?;

        let store = Self {
            name: "sqlite".to_string(),
            pool,
            models: models.into(),
            schema_sql: schema_sql.into(),
        };
        store.reset().await?;
        Ok(store)
    }

    /// Open a scratch database from a schema file on disk
    pub async fn from_schema_file(
        models: impl Into<Arc<ModelCatalog>>,
        schema_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let schema_path = schema_path.as_ref();
        let schema_sql = std::fs::read_to_string(schema_path).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read schema file '{}': {}",
                schema_path.display(),
                e
            ))
        })?;
        Self::open(models, schema_sql).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_record(&self, table: &str, row: &SqliteRow) -> Result<Record> {
        let mut values = Row::new();
        for (index, column) in row.columns().iter().enumerate() {
            values.insert(column.name().to_string(), extract_value(row, index)?);
        }

        let primary_key = self.models.primary_key(table);
        let id = values
            .get(primary_key)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| {
                Error::database(format!(
                    "Row of {} has no integer primary key '{}'",
                    table, primary_key
                ))
            })?;
        Ok(Record::new(id, values))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read one column using the storage class of the value itself
fn extract_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_uppercase();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::BigInt(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => SqlValue::Double(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::String(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// Bind a SqlValue to a SQLite query
fn bind_param(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        // SQLite stores booleans as integers
        SqlValue::Bool(b) => query.bind(i64::from(b)),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::BigInt(i) => query.bind(i),
        SqlValue::Double(f) => query.bind(f),
        SqlValue::Decimal(s) => query.bind(s),
        SqlValue::String(s) => query.bind(s),
        SqlValue::Bytes(b) => query.bind(b),
        SqlValue::Json(j) => query.bind(j.to_string()),
        SqlValue::Date(s) | SqlValue::Time(s) | SqlValue::DateTime(s) => query.bind(s),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> &ModelCatalog {
        &self.models
    }

    async fn schema_version(&self) -> Result<i64> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn reset(&self) -> Result<()> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&self.pool)
        .await?;

        sqlx::raw_sql("PRAGMA foreign_keys = OFF")
            .execute(&self.pool)
            .await?;
        for table in &tables {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table));
            sqlx::raw_sql(&sql).execute(&self.pool).await?;
        }

        sqlx::raw_sql(&self.schema_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Failed to load schema: {}", e)))?;

        log::debug!(
            "Reset SQLite store '{}': dropped {} tables, schema reloaded",
            self.name,
            tables.len()
        );
        Ok(())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<i64> {
        stamp_insert(&self.models, table, &mut row);
        let primary_key = self.models.primary_key(table);
        let explicit_id = row.get(primary_key).and_then(SqlValue::as_i64);

        let sql = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
        } else {
            let columns: Vec<String> = row.keys().map(|c| quote_identifier(c)).collect();
            let placeholders = vec!["?"; row.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                columns.join(", "),
                placeholders
            )
        };
        log::debug!("SQLite INSERT: {}", sql);

        let mut query = sqlx::query(&sql);
        for value in row.into_values() {
            query = bind_param(query, value);
        }
        let result = query.execute(&self.pool).await?;

        Ok(explicit_id.unwrap_or_else(|| result.last_insert_rowid()))
    }

    async fn update(&self, table: &str, id: i64, mut changes: Row) -> Result<()> {
        stamp_update(&self.models, table, &mut changes);
        if changes.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = changes
            .keys()
            .map(|c| format!("{} = ?", quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(self.models.primary_key(table))
        );
        log::debug!("SQLite UPDATE: {}", sql);

        let mut query = sqlx::query(&sql);
        for value in changes.into_values() {
            query = bind_param(query, value);
        }
        let result = query.bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(Error::database(format!("{} record {} not found", table, id)));
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(table),
            quote_identifier(self.models.primary_key(table))
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, table: &str, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_identifier(table),
            quote_identifier(self.models.primary_key(table))
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| self.row_to_record(table, &row)).transpose()
    }

    async fn all(&self, table: &str) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            quote_identifier(table),
            quote_identifier(self.models.primary_key(table))
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| self.row_to_record(table, row))
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        log::debug!("SQLite EXECUTE: {}", sql);
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
