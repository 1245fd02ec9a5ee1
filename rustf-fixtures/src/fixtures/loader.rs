//! Loading existing fixture files into the scratch store

use super::{FixtureValue, LabelMapping};
use crate::error::{Error, Result};
use crate::migrations::RecordSet;
use crate::models::{BelongsTo, ColumnType, FixtureTable, Model, ModelCatalog};
use crate::store::{RecordStore, Row, SqlValue};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_yaml::Value as YamlValue;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Upper bound for generated fixture ids
const MAX_ID: u32 = (1 << 30) - 1;

/// Stable primary key for a fixture label
pub fn identify(label: &str) -> i64 {
    let digest = Sha256::digest(label.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    i64::from(prefix % MAX_ID)
}

/// What loading the existing fixtures produced
#[derive(Debug, Clone, Default)]
pub struct LoadedFixtures {
    /// Label of every loaded row by table and primary key
    pub mapping: LabelMapping,
    /// Accessor name → labels of that fixture file
    pub accessors: BTreeMap<String, RecordSet>,
}

impl LoadedFixtures {
    pub fn record_count(&self) -> usize {
        self.mapping.len()
    }
}

struct FixtureFile {
    table: FixtureTable,
    path: PathBuf,
    entries: Vec<(String, serde_yaml::Mapping)>,
}

/// Reads fixture YAML files and inserts their rows
pub struct FixtureLoader<'a> {
    models: &'a ModelCatalog,
}

impl<'a> FixtureLoader<'a> {
    pub fn new(models: &'a ModelCatalog) -> Self {
        Self { models }
    }

    /// Insert every fixture found under `dirs` into `store`
    ///
    /// Files whose path does not name a fixture table are skipped.
    pub async fn load(&self, store: &dyn RecordStore, dirs: &[PathBuf]) -> Result<LoadedFixtures> {
        let tables: HashMap<String, FixtureTable> = self
            .models
            .fixture_tables()?
            .into_iter()
            .map(|t| (t.fixture_name.clone(), t))
            .collect();

        let mut files = Vec::new();
        for dir in dirs {
            files.extend(self.read_dir(dir, &tables)?);
        }

        // Ids first, so references resolve whatever the file order
        let mut ids: HashMap<(String, String), i64> = HashMap::new();
        for file in &files {
            let primary_key = self.models.primary_key(&file.table.table);
            for (label, attributes) in &file.entries {
                let id = attributes
                    .get(primary_key)
                    .and_then(YamlValue::as_i64)
                    .unwrap_or_else(|| identify(label));
                ids.insert((file.table.table.clone(), label.clone()), id);
            }
        }

        let mut loaded = LoadedFixtures::default();
        for file in &files {
            let set = loaded
                .accessors
                .entry(file.table.accessor.clone())
                .or_insert_with(|| RecordSet::new(&file.table.accessor, &file.table.table));

            for (label, attributes) in &file.entries {
                let row = self
                    .build_row(&file.table.table, label, attributes, &ids)
                    .map_err(|e| {
                        e.with_context(format!(
                            "Failed to load fixture '{}' from {}",
                            label,
                            file.path.display()
                        ))
                    })?;
                let id = store.insert(&file.table.table, row).await.map_err(|e| {
                    e.with_context(format!(
                        "Failed to insert fixture '{}' from {}",
                        label,
                        file.path.display()
                    ))
                })?;

                set.labels.insert(label.clone(), id);
                loaded
                    .mapping
                    .insert((file.table.table.clone(), id), label.clone());
            }
            log::debug!(
                "Loaded {} fixtures from {}",
                file.entries.len(),
                file.path.display()
            );
        }

        log::info!(
            "Loaded {} pre-existing fixtures from {} files",
            loaded.record_count(),
            files.len()
        );
        Ok(loaded)
    }

    fn read_dir(&self, dir: &Path, tables: &HashMap<String, FixtureTable>) -> Result<Vec<FixtureFile>> {
        if !dir.is_dir() {
            log::debug!("Fixture directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(dir).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yml") | Some("yaml")
            );
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }

            let Some(fixture_name) = fixture_name_for(dir, path) else {
                continue;
            };
            let Some(table) = tables.get(&fixture_name) else {
                log::warn!(
                    "Skipping {}: no model maps to fixture '{}'",
                    path.display(),
                    fixture_name
                );
                continue;
            };

            files.push(FixtureFile {
                table: table.clone(),
                path: path.to_path_buf(),
                entries: read_entries(path)?,
            });
        }
        Ok(files)
    }

    fn build_row(
        &self,
        table: &str,
        label: &str,
        attributes: &serde_yaml::Mapping,
        ids: &HashMap<(String, String), i64>,
    ) -> Result<Row> {
        let root = self
            .models
            .table_owner(table)
            .ok_or_else(|| Error::unknown_model(format!("no model owns table {}", table)))?;
        let type_value = attributes
            .get(root.inheritance_column.as_str())
            .and_then(YamlValue::as_str);
        let model = self
            .models
            .concrete_model(table, type_value)
            .unwrap_or(root);
        let columns = self.models.table_columns(table);

        let id = ids
            .get(&(table.to_string(), label.to_string()))
            .copied()
            .unwrap_or_else(|| identify(label));
        let mut row = Row::new();
        row.insert(model.primary_key.clone(), SqlValue::BigInt(id));

        for (key, value) in attributes {
            let Some(key) = key.as_str() else {
                continue;
            };
            match model.belongs_to.get(key) {
                Some(association) => {
                    self.insert_reference(&mut row, model, association, value, ids)?;
                }
                None => {
                    row.insert(key.to_string(), column_value(columns.get(key).copied(), value)?);
                }
            }
        }

        Ok(row)
    }

    fn insert_reference(
        &self,
        row: &mut Row,
        model: &Model,
        association: &BelongsTo,
        value: &YamlValue,
        ids: &HashMap<(String, String), i64>,
    ) -> Result<()> {
        let text = match value {
            YamlValue::Null => {
                row.insert(association.foreign_key.clone(), SqlValue::Null);
                if let Some(type_column) = &association.foreign_type {
                    row.insert(type_column.clone(), SqlValue::Null);
                }
                return Ok(());
            }
            YamlValue::String(s) => s.clone(),
            other => SqlValue::from_yaml(other).to_string(),
        };
        let (label, type_name) = FixtureValue::parse_reference(&text);

        let target_name = match (&association.foreign_type, type_name) {
            (Some(type_column), Some(type_name)) => {
                row.insert(type_column.clone(), SqlValue::String(type_name.clone()));
                type_name
            }
            (Some(_), None) => {
                return Err(Error::invalid_config(format!(
                    "{}.{} is polymorphic; write it as '{} (Type)'",
                    model.name, association.name, label
                )));
            }
            (None, _) => association.model.clone().unwrap_or_default(),
        };

        let target = self.models.require(&target_name)?;
        let target_table = target.table.as_deref().ok_or_else(|| {
            Error::invalid_config(format!("model {} has no table", target.name))
        })?;
        let id = ids
            .get(&(target_table.to_string(), label.clone()))
            .copied()
            .unwrap_or_else(|| identify(&label));

        row.insert(association.foreign_key.clone(), SqlValue::BigInt(id));
        Ok(())
    }
}

/// Relative path of `path` under `dir`, without extension and with `/` separators
fn fixture_name_for(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn read_entries(path: &Path) -> Result<Vec<(String, serde_yaml::Mapping)>> {
    let contents = std::fs::read_to_string(path)?;
    let document: YamlValue = serde_yaml::from_str(&contents)
        .map_err(|e| Error::from(e).with_context(format!("Invalid fixture file {}", path.display())))?;

    let mapping = match document {
        YamlValue::Null => return Ok(Vec::new()),
        YamlValue::Mapping(mapping) => mapping,
        _ => {
            return Err(Error::invalid_config(format!(
                "Fixture file {} must map labels to attributes",
                path.display()
            )))
        }
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (label, attributes) in mapping {
        let label = match label {
            YamlValue::String(s) => s,
            other => SqlValue::from_yaml(&other).to_string(),
        };
        if label == "_fixture" {
            continue;
        }
        let attributes = match attributes {
            YamlValue::Mapping(m) => m,
            YamlValue::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(Error::invalid_config(format!(
                    "Fixture '{}' in {} must be a mapping",
                    label,
                    path.display()
                )))
            }
        };
        entries.push((label, attributes));
    }
    Ok(entries)
}

/// Store value for a YAML attribute of a column
fn column_value(column_type: Option<ColumnType>, value: &YamlValue) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let converted = match (column_type, value) {
        (Some(ColumnType::Binary), YamlValue::String(text)) => {
            let bytes = BASE64
                .decode(text.trim())
                .map_err(|e| Error::invalid_config(format!("Invalid base64 value: {}", e)))?;
            SqlValue::Bytes(bytes)
        }
        (Some(ColumnType::Json), YamlValue::String(text)) => serde_json::from_str(text)
            .map(SqlValue::Json)
            .unwrap_or_else(|_| SqlValue::String(text.clone())),
        (Some(ColumnType::Json), other) => SqlValue::Json(serde_json::to_value(other)?),
        (Some(ColumnType::Decimal), YamlValue::Number(n)) => SqlValue::Decimal(n.to_string()),
        (Some(t), YamlValue::String(text)) if t.is_temporal() => match t {
            ColumnType::Date => SqlValue::Date(text.clone()),
            ColumnType::Time => SqlValue::Time(text.clone()),
            _ => SqlValue::DateTime(text.clone()),
        },
        (_, other) => SqlValue::from_yaml(other),
    };
    Ok(converted)
}
