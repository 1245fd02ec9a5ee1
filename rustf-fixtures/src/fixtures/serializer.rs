//! Record to fixture attribute conversion

use super::{Attributes, FixtureSnapshot, FixtureValue, Labeler};
use crate::error::{Error, Result};
use crate::models::{BelongsTo, ColumnType, Model, ModelCatalog};
use crate::store::{Record, SqlValue, CREATED_AT, UPDATED_AT};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_yaml::Value as YamlValue;

/// Serializes the records of a snapshot into fixture attributes
pub struct RecordSerializer<'a> {
    models: &'a ModelCatalog,
    labeler: &'a Labeler<'a>,
    snapshot: &'a FixtureSnapshot,
}

impl<'a> RecordSerializer<'a> {
    pub fn new(
        models: &'a ModelCatalog,
        labeler: &'a Labeler<'a>,
        snapshot: &'a FixtureSnapshot,
    ) -> Self {
        Self {
            models,
            labeler,
            snapshot,
        }
    }

    /// Attributes of `record`, without primary key, timestamps or raw foreign keys
    pub fn serialize(&self, table: &str, record: &Record) -> Result<Attributes> {
        let root = self
            .models
            .table_owner(table)
            .ok_or_else(|| Error::unknown_model(format!("no model owns table {}", table)))?;
        let type_value = record.get_str(&root.inheritance_column);
        let model = self
            .models
            .concrete_model(table, type_value.as_deref())
            .unwrap_or(root);
        let columns = self.models.table_columns(table);

        let mut attributes = Attributes::new();
        for (column, value) in &record.values {
            if column == &model.primary_key || column == CREATED_AT || column == UPDATED_AT {
                continue;
            }

            if let Some(association) = model.association_for_column(column) {
                if attributes.contains_key(&association.name) {
                    continue;
                }
                if let Some(reference) = self.reference(table, record, association)? {
                    attributes.insert(association.name.clone(), reference);
                }
                continue;
            }

            let serialized = serialize_value(columns.get(column).copied(), value);
            attributes.insert(column.clone(), FixtureValue::Scalar(serialized));
        }

        Ok(attributes)
    }

    /// Label of the record `association` points at, `None` for a NULL foreign key
    fn reference(
        &self,
        table: &str,
        record: &Record,
        association: &BelongsTo,
    ) -> Result<Option<FixtureValue>> {
        let Some(target_id) = record.get_i64(&association.foreign_key) else {
            return Ok(None);
        };
        let broken = |message: String| {
            Error::broken_reference(table, &association.name, record.id, message)
        };

        let (target, type_name) = match &association.foreign_type {
            Some(type_column) => {
                let type_name = record.get_str(type_column).ok_or_else(|| {
                    broken(format!("{} is empty while {} is set", type_column, association.foreign_key))
                })?;
                let target = self
                    .models
                    .model(&type_name)
                    .ok_or_else(|| broken(format!("unknown polymorphic type {}", type_name)))?;
                (target, Some(type_name))
            }
            None => {
                let model_name = association.model.as_deref().unwrap_or_default();
                let target = self
                    .models
                    .model(model_name)
                    .ok_or_else(|| broken(format!("unknown model {}", model_name)))?;
                (target, None)
            }
        };

        let target_table = target_table(target)
            .ok_or_else(|| broken(format!("model {} has no table", target.name)))?;
        let target_record = self.snapshot.find(target_table, target_id).ok_or_else(|| {
            broken(format!("{} record {} does not exist", target_table, target_id))
        })?;

        let label = self.labeler.label_for(target_table, target_record)?;
        Ok(Some(FixtureValue::Reference { label, type_name }))
    }
}

fn target_table(model: &Model) -> Option<&str> {
    model.table.as_deref()
}

/// Canonical YAML form of a column value
fn serialize_value(column_type: Option<ColumnType>, value: &SqlValue) -> YamlValue {
    if value.is_null() {
        return YamlValue::Null;
    }

    let converted = match column_type {
        // Stored text, not a parsed timestamp
        Some(t) if t.is_temporal() => value.as_string().map(YamlValue::String),
        Some(ColumnType::Boolean) => value.as_bool().map(YamlValue::Bool),
        Some(ColumnType::Integer) => value.as_i64().map(YamlValue::from),
        Some(ColumnType::Float) => value.as_f64().map(YamlValue::from),
        Some(ColumnType::Json) => Some(YamlValue::String(json_text(value))),
        Some(ColumnType::Binary) => Some(YamlValue::String(base64_text(value))),
        Some(ColumnType::Decimal | ColumnType::String | ColumnType::Text) => {
            value.as_string().map(YamlValue::String)
        }
        _ => None,
    };

    converted.unwrap_or_else(|| natural_value(value))
}

fn natural_value(value: &SqlValue) -> YamlValue {
    match value {
        SqlValue::Null => YamlValue::Null,
        SqlValue::Bool(b) => YamlValue::Bool(*b),
        SqlValue::Int(i) => YamlValue::from(*i),
        SqlValue::BigInt(i) => YamlValue::from(*i),
        SqlValue::Double(f) => YamlValue::from(*f),
        SqlValue::Bytes(_) => YamlValue::String(base64_text(value)),
        other => YamlValue::String(other.as_string().unwrap_or_default()),
    }
}

fn json_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Json(json) => json.to_string(),
        other => {
            let text = other.as_string().unwrap_or_default();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|json| json.to_string())
                .unwrap_or(text)
        }
    }
}

fn base64_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Bytes(bytes) => BASE64.encode(bytes),
        other => BASE64.encode(other.as_string().unwrap_or_default()),
    }
}
