//! Fixture data: loading YAML fixtures into the scratch store and turning
//! the store's records back into YAML
//!
//! A fixture file maps labels to attributes. Belongs-to associations are
//! written by label instead of by foreign key, with the concrete type
//! appended for polymorphic ones:
//!
//! ```yaml
//! rocket:
//!   power: 120
//!   type: Weaponizable::Weapon::Rocket
//!   weaponizable: greenie (Character::Turtle)
//! ```

pub mod builder;
pub mod labeler;
pub mod loader;
pub mod serializer;
pub mod snapshot;
pub mod writer;

pub use builder::FixtureSetBuilder;
pub use labeler::Labeler;
pub use loader::{identify, FixtureLoader, LoadedFixtures};
pub use serializer::RecordSerializer;
pub use snapshot::FixtureSnapshot;
pub use writer::FixtureWriter;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

static TYPED_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\s*\(([^()]+)\)$").expect("FixtureValue: Invalid reference regex")
});

/// Labels known before the run, keyed by `(table, primary key)`
pub type LabelMapping = HashMap<(String, i64), String>;

/// Serialized attributes of one record, sorted by name
pub type Attributes = BTreeMap<String, FixtureValue>;

/// Regenerated fixtures keyed by table name
pub type FixtureSet = BTreeMap<String, FixtureTableData>;

/// Value of one fixture attribute
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureValue {
    Scalar(serde_yaml::Value),
    /// Belongs-to association written as the target's label
    Reference {
        label: String,
        /// Concrete type, polymorphic associations only
        type_name: Option<String>,
    },
}

impl FixtureValue {
    pub fn reference(label: impl Into<String>) -> Self {
        FixtureValue::Reference {
            label: label.into(),
            type_name: None,
        }
    }

    pub fn polymorphic(label: impl Into<String>, type_name: impl Into<String>) -> Self {
        FixtureValue::Reference {
            label: label.into(),
            type_name: Some(type_name.into()),
        }
    }

    /// Split `greenie (Character::Turtle)` into label and type
    pub fn parse_reference(text: &str) -> (String, Option<String>) {
        match TYPED_REFERENCE.captures(text.trim()) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].trim().to_string())),
            None => (text.trim().to_string(), None),
        }
    }
}

impl fmt::Display for FixtureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureValue::Reference {
                label,
                type_name: Some(type_name),
            } => write!(f, "{} ({})", label, type_name),
            FixtureValue::Reference { label, .. } => f.write_str(label),
            FixtureValue::Scalar(value) => match value {
                serde_yaml::Value::Null => f.write_str("null"),
                serde_yaml::Value::Bool(b) => write!(f, "{}", b),
                serde_yaml::Value::Number(n) => write!(f, "{}", n),
                serde_yaml::Value::String(s) => f.write_str(s),
                other => {
                    let text = serde_yaml::to_string(other).map_err(|_| fmt::Error)?;
                    f.write_str(text.trim_end())
                }
            },
        }
    }
}

impl Serialize for FixtureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FixtureValue::Scalar(value) => value.serialize(serializer),
            reference => serializer.serialize_str(&reference.to_string()),
        }
    }
}

impl From<serde_yaml::Value> for FixtureValue {
    fn from(value: serde_yaml::Value) -> Self {
        FixtureValue::Scalar(value)
    }
}

/// One regenerated fixture entry
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub table: String,
    pub label: String,
    pub attributes: Attributes,
}

/// Regenerated fixtures of one table
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureTableData {
    /// Relative file path without extension, e.g. `character/turtles`
    pub fixture_name: String,
    pub records: BTreeMap<String, Attributes>,
}

impl FixtureTableData {
    pub fn new(fixture_name: impl Into<String>) -> Self {
        Self {
            fixture_name: fixture_name.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Attributes> {
        self.records.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}
