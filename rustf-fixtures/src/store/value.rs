//! Unified SQL value type for record stores
//!
//! Stores hand records to the fixture engine as [`SqlValue`]s, whatever their
//! backend. The serializer then applies the declared column type.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Generic SQL value for record storage and parameter binding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    // Null
    Null,

    // Boolean
    Bool(bool),

    // Integers
    Int(i32),
    BigInt(i64),

    // Floating point
    Double(f64),
    Decimal(String), // Kept as text to preserve precision

    // Text
    String(String),

    // Binary
    Bytes(Vec<u8>),

    // Semantic types
    Json(JsonValue),
    Date(String),     // ISO date: "2024-01-15"
    Time(String),     // ISO time: "14:30:00"
    DateTime(String), // Stored datetime: "2024-01-15 10:30:00"
}

impl SqlValue {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert to a boolean if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Int(i) => Some(*i != 0),
            SqlValue::BigInt(i) => Some(*i != 0),
            SqlValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(true),
                "false" | "f" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to an i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i as i64),
            SqlValue::BigInt(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            SqlValue::String(s) | SqlValue::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to an f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Double(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::BigInt(i) => Some(*i as f64),
            SqlValue::String(s) | SqlValue::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to a String
    pub fn as_string(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bytes(_) => None,
            SqlValue::String(s)
            | SqlValue::Decimal(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => Some(s.clone()),
            SqlValue::Json(j) => Some(j.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::BigInt(i) => Some(i.to_string()),
            SqlValue::Double(f) => Some(f.to_string()),
        }
    }

    /// Build a value from a YAML scalar read out of a fixture file
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => SqlValue::Null,
            serde_yaml::Value::Bool(b) => SqlValue::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::BigInt(i)
                } else {
                    SqlValue::Double(n.as_f64().unwrap_or_default())
                }
            }
            serde_yaml::Value::String(s) => SqlValue::String(s.clone()),
            serde_yaml::Value::Tagged(tagged) => SqlValue::from_yaml(&tagged.value),
            other => serde_json::to_value(other)
                .map(SqlValue::Json)
                .unwrap_or(SqlValue::Null),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::BigInt(i) => write!(f, "{}", i),
            SqlValue::Double(d) => write!(f, "{}", d),
            SqlValue::Decimal(s) => write!(f, "{}", s),
            SqlValue::String(s) => write!(f, "{}", s),
            SqlValue::Date(s) | SqlValue::Time(s) | SqlValue::DateTime(s) => write!(f, "{}", s),
            SqlValue::Json(j) => write!(f, "{}", j),
            SqlValue::Bytes(b) => write!(f, "<binary:{} bytes>", b.len()),
        }
    }
}

// From trait implementations for common types
impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => SqlValue::Null,
        }
    }
}

// Date/Time type conversions
impl From<chrono::NaiveDate> for SqlValue {
    fn from(date: chrono::NaiveDate) -> Self {
        SqlValue::Date(date.to_string())
    }
}

impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(dt: chrono::NaiveDateTime) -> Self {
        SqlValue::DateTime(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlValue {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        SqlValue::from(dt.naive_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bool_from_sqlite_integers() {
        assert_eq!(SqlValue::BigInt(1).as_bool(), Some(true));
        assert_eq!(SqlValue::BigInt(0).as_bool(), Some(false));
        assert_eq!(SqlValue::String("t".into()).as_bool(), Some(true));
        assert_eq!(SqlValue::Double(1.0).as_bool(), None);
    }

    #[test]
    fn test_from_yaml_scalars() {
        let value: serde_yaml::Value = serde_yaml::from_str("120").unwrap();
        assert_eq!(SqlValue::from_yaml(&value), SqlValue::BigInt(120));

        let value: serde_yaml::Value = serde_yaml::from_str("0.15").unwrap();
        assert_eq!(SqlValue::from_yaml(&value), SqlValue::Double(0.15));

        let value: serde_yaml::Value = serde_yaml::from_str("hard").unwrap();
        assert_eq!(SqlValue::from_yaml(&value), SqlValue::String("hard".into()));
    }

    #[test]
    fn test_naive_datetime_uses_stored_format() {
        let dt = chrono::NaiveDate::from_ymd_opt(2018, 12, 9)
            .unwrap()
            .and_hms_opt(22, 30, 0)
            .unwrap();
        assert_eq!(
            SqlValue::from(dt),
            SqlValue::DateTime("2018-12-09 22:30:00".to_string())
        );
    }
}
