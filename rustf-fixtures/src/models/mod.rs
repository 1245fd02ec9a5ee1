//! Model catalog: the host application's table, column and association metadata
//!
//! The catalog is declared in YAML, one entry per model:
//!
//! ```yaml
//! Level:
//!   table: levels
//!   columns:
//!     id: integer
//!     name: string(255)
//!     difficulty: string
//!     unlocked: boolean
//!     created_at: datetime
//!     updated_at: datetime
//!
//! Character:
//!   abstract: true
//!   belongs_to:
//!     level: {}
//!
//! Character::Turtle:
//!   parent: Character
//!   table: character_turtles
//!   columns: { id: integer, name: string, level_id: integer, type: string }
//!
//! Character::Turtle::Green:
//!   parent: Character::Turtle
//!
//! Weaponizable::Weapon:
//!   table: weaponizable_weapons
//!   belongs_to:
//!     weaponizable: { polymorphic: true }
//! ```
//!
//! Fixture files follow the table name, with the root model's namespaces
//! as directories (`character_turtles` is read from `character/turtles.yml`).
//! A model may name its file explicitly with `fixture_name`.
//!
//! Models without a `table` inherit the table of a concrete parent (single
//! table inheritance). Columns follow the table; `belongs_to` associations are
//! inherited from every ancestor, abstract ones included.

pub mod inflection;

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Column type as declared in the model catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ColumnType {
    Integer,
    Float,
    Decimal,
    Boolean,
    String,
    Text,
    Date,
    DateTime,
    Time,
    Json,
    Binary,
}

impl ColumnType {
    /// Date and time columns keep their stored representation in fixtures
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime | ColumnType::Time)
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    /// Parse a type string like `integer`, `string(255)` or `decimal(10,2)`
    fn from_str(type_str: &str) -> Result<Self> {
        let base = type_str
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let column_type = match base.as_str() {
            "integer" | "int" | "bigint" | "smallint" | "serial" | "bigserial" => {
                ColumnType::Integer
            }
            "float" | "double" | "real" => ColumnType::Float,
            "decimal" | "numeric" => ColumnType::Decimal,
            "boolean" | "bool" => ColumnType::Boolean,
            "string" | "varchar" | "char" | "citext" => ColumnType::String,
            "text" => ColumnType::Text,
            "date" => ColumnType::Date,
            "datetime" | "timestamp" | "timestamptz" => ColumnType::DateTime,
            "time" => ColumnType::Time,
            "json" | "jsonb" => ColumnType::Json,
            "binary" | "blob" | "bytea" => ColumnType::Binary,
            _ => {
                return Err(Error::invalid_config(format!(
                    "Unknown column type: {}",
                    type_str
                )))
            }
        };

        Ok(column_type)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Json => "json",
            ColumnType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Model entry as written in the catalog YAML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub table: Option<String>,

    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    #[serde(default)]
    pub primary_key: Option<String>,

    #[serde(default)]
    pub inheritance_column: Option<String>,

    /// Fixture file name for the model's table, overriding the derived one
    #[serde(default)]
    pub fixture_name: Option<String>,

    #[serde(default)]
    pub columns: IndexMap<String, ColumnType>,

    #[serde(default)]
    pub belongs_to: IndexMap<String, Option<BelongsToDefinition>>,
}

/// Belongs-to entry as written in the catalog YAML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BelongsToDefinition {
    #[serde(default)]
    pub foreign_key: Option<String>,

    #[serde(default)]
    pub polymorphic: bool,

    #[serde(default)]
    pub foreign_type: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

/// Resolved belongs-to association
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsTo {
    pub name: String,
    pub foreign_key: String,
    pub polymorphic: bool,
    /// Type column, set for polymorphic associations only
    pub foreign_type: Option<String>,
    /// Target model, set for non-polymorphic associations only
    pub model: Option<String>,
}

impl BelongsTo {
    fn resolve(name: &str, definition: BelongsToDefinition) -> Self {
        let foreign_key = definition
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", name));

        if definition.polymorphic {
            BelongsTo {
                name: name.to_string(),
                foreign_key,
                polymorphic: true,
                foreign_type: Some(
                    definition
                        .foreign_type
                        .unwrap_or_else(|| format!("{}_type", name)),
                ),
                model: None,
            }
        } else {
            BelongsTo {
                name: name.to_string(),
                foreign_key,
                polymorphic: false,
                foreign_type: None,
                model: Some(
                    definition
                        .model
                        .unwrap_or_else(|| inflection::to_pascal_case(name)),
                ),
            }
        }
    }

    /// Whether `column` is the foreign key or foreign type of this association
    pub fn owns_column(&self, column: &str) -> bool {
        self.foreign_key == column || self.foreign_type.as_deref() == Some(column)
    }
}

/// Fully resolved model with inheritance applied
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub parent: Option<String>,
    pub table: Option<String>,
    pub is_abstract: bool,
    pub primary_key: String,
    pub inheritance_column: String,
    pub fixture_name: Option<String>,
    pub columns: IndexMap<String, ColumnType>,
    pub belongs_to: IndexMap<String, BelongsTo>,
}

impl Model {
    /// Find the association whose foreign key or foreign type is `column`
    pub fn association_for_column(&self, column: &str) -> Option<&BelongsTo> {
        self.belongs_to.values().find(|assoc| assoc.owns_column(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }
}

/// A physical table that gets its own fixture file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureTable {
    pub table: String,
    /// Topmost model owning the table
    pub model: String,
    /// Relative fixture path without extension, e.g. `character/turtles`
    pub fixture_name: String,
    /// Accessor name used by migrations, e.g. `character_turtles`
    pub accessor: String,
}

/// All models of the host application
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, Model>,
}

impl ModelCatalog {
    /// Load a catalog from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read model catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|e| e.with_context(format!("Invalid model catalog '{}'", path.display())))
    }

    /// Parse a catalog from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let definitions: IndexMap<String, ModelDefinition> = serde_yaml::from_str(contents)?;
        Self::from_definitions(definitions)
    }

    /// Resolve inheritance for a set of model definitions
    pub fn from_definitions(definitions: IndexMap<String, ModelDefinition>) -> Result<Self> {
        let mut models = BTreeMap::new();
        for name in definitions.keys() {
            let mut visiting = HashSet::new();
            Self::resolve_model(name, &definitions, &mut models, &mut visiting)?;
        }

        for model in models.values() {
            if model.table.is_none() && !model.is_abstract {
                return Err(Error::invalid_config(format!(
                    "Model {} has no table and no concrete parent",
                    model.name
                )));
            }
        }

        Ok(Self { models })
    }

    fn resolve_model(
        name: &str,
        definitions: &IndexMap<String, ModelDefinition>,
        models: &mut BTreeMap<String, Model>,
        visiting: &mut HashSet<String>,
    ) -> Result<()> {
        if models.contains_key(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(Error::invalid_config(format!(
                "Circular inheritance involving model {}",
                name
            )));
        }

        let definition = definitions
            .get(name)
            .ok_or_else(|| Error::unknown_model(name))?
            .clone();

        let parent = match &definition.parent {
            Some(parent_name) => {
                Self::resolve_model(parent_name, definitions, models, visiting)?;
                models.get(parent_name).cloned()
            }
            None => None,
        };

        let inherited_table = parent
            .as_ref()
            .filter(|p| !p.is_abstract)
            .and_then(|p| p.table.clone());
        let table = if definition.is_abstract {
            None
        } else {
            definition.table.clone().or(inherited_table)
        };

        // Columns belong to the table, so only a parent sharing it contributes
        let mut columns = match (&parent, &table) {
            (Some(p), Some(t)) if p.table.as_deref() == Some(t.as_str()) => p.columns.clone(),
            _ => IndexMap::new(),
        };
        columns.extend(definition.columns.clone());

        let mut belongs_to = parent
            .as_ref()
            .map(|p| p.belongs_to.clone())
            .unwrap_or_default();
        for (assoc_name, assoc) in &definition.belongs_to {
            belongs_to.insert(
                assoc_name.clone(),
                BelongsTo::resolve(assoc_name, assoc.clone().unwrap_or_default()),
            );
        }

        let primary_key = definition
            .primary_key
            .clone()
            .or_else(|| parent.as_ref().map(|p| p.primary_key.clone()))
            .unwrap_or_else(|| "id".to_string());
        let inheritance_column = definition
            .inheritance_column
            .clone()
            .or_else(|| parent.as_ref().map(|p| p.inheritance_column.clone()))
            .unwrap_or_else(|| "type".to_string());

        models.insert(
            name.to_string(),
            Model {
                name: name.to_string(),
                parent: definition.parent.clone(),
                table,
                is_abstract: definition.is_abstract,
                primary_key,
                inheritance_column,
                fixture_name: definition.fixture_name.clone(),
                columns,
                belongs_to,
            },
        );
        visiting.remove(name);
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Get a model or fail with `UnknownModel`
    pub fn require(&self, name: &str) -> Result<&Model> {
        self.model(name).ok_or_else(|| Error::unknown_model(name))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Topmost ancestor of `name` that owns the same physical table
    pub fn root_of(&self, name: &str) -> Option<&Model> {
        let mut current = self.model(name)?;
        let table = current.table.as_deref()?;
        while let Some(parent) = current.parent.as_deref().and_then(|p| self.model(p)) {
            if parent.table.as_deref() != Some(table) {
                break;
            }
            current = parent;
        }
        Some(current)
    }

    /// Every physical table with the root model that owns it, sorted by table name
    ///
    /// Fails with `RepeatedTableKey` when two unrelated models claim one table.
    pub fn fixture_tables(&self) -> Result<Vec<FixtureTable>> {
        let mut tables: BTreeMap<String, FixtureTable> = BTreeMap::new();

        for model in self.models.values() {
            let Some(table) = model.table.as_deref() else {
                continue;
            };
            let is_root = self
                .root_of(&model.name)
                .map_or(false, |root| root.name == model.name);
            if !is_root {
                continue;
            }

            let fixture_name = model
                .fixture_name
                .clone()
                .unwrap_or_else(|| inflection::fixture_name(&model.name, table));
            let entry = FixtureTable {
                table: table.to_string(),
                model: model.name.clone(),
                accessor: inflection::accessor_name(&fixture_name),
                fixture_name,
            };

            if let Some(existing) = tables.get(table) {
                return Err(Error::RepeatedTableKey {
                    table: table.to_string(),
                    first: existing.model.clone(),
                    second: model.name.clone(),
                });
            }
            tables.insert(table.to_string(), entry);
        }

        Ok(tables.into_values().collect())
    }

    /// Root model owning physical table `table`
    pub fn table_owner(&self, table: &str) -> Option<&Model> {
        self.models
            .values()
            .filter(|m| m.table.as_deref() == Some(table))
            .find_map(|m| self.root_of(&m.name))
    }

    /// Every physical table declared by some model, sorted
    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .models
            .values()
            .filter_map(|m| m.table.clone())
            .collect();
        tables.sort();
        tables.dedup();
        tables
    }

    /// Columns of a physical table: the root model's columns followed by
    /// any extra columns declared on subclasses sharing the table
    pub fn table_columns(&self, table: &str) -> IndexMap<String, ColumnType> {
        let mut columns = self
            .table_owner(table)
            .map(|root| root.columns.clone())
            .unwrap_or_default();
        for model in self.models.values() {
            if model.table.as_deref() != Some(table) {
                continue;
            }
            for (name, column_type) in &model.columns {
                if !columns.contains_key(name) {
                    columns.insert(name.clone(), *column_type);
                }
            }
        }
        columns
    }

    /// Primary key column of a physical table
    pub fn primary_key(&self, table: &str) -> &str {
        self.table_owner(table)
            .map(|m| m.primary_key.as_str())
            .unwrap_or("id")
    }

    /// Model describing a record of `table` whose inheritance column holds `type_value`
    ///
    /// Falls back to the table's root model when the type is absent or names a
    /// model that lives elsewhere.
    pub fn concrete_model(&self, table: &str, type_value: Option<&str>) -> Option<&Model> {
        type_value
            .and_then(|name| self.model(name))
            .filter(|m| m.table.as_deref() == Some(table))
            .or_else(|| self.table_owner(table))
    }
}
