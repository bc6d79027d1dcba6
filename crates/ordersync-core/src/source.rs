//! Staged source rows
//!
//! The source of truth is a wide table whose column set is defined by
//! external configuration, not hard-coded struct fields. A [`SourceRow`]
//! wraps one staged row as a JSON object with column order preserved, and
//! [`CellValue`] canonicalizes each cell to a fixed-format representation so
//! that logically-equal values hash identically regardless of how the
//! upstream serialized them.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A single cell, normalized from its upstream JSON representation
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    /// Normalize a JSON value.
    ///
    /// Whitespace-only strings collapse to `Null`; strings in `YYYY-MM-DD`
    /// or RFC 3339 form become calendar dates so a date column hashes the
    /// same whether the upstream sent a date or a timestamp string.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_i64().map_or_else(
                || n.as_f64().map_or(Self::Null, Self::Float),
                Self::Integer,
            ),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Self::Null
                } else if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    Self::Date(date)
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                    Self::Date(dt.date_naive())
                } else {
                    Self::Text(trimmed.to_string())
                }
            }
            // Nested structures should not appear in a wide row; keep their
            // serialized form so they still participate in hashing.
            other => Self::Text(other.to_string()),
        }
    }

    /// Canonical fixed-format string used for hashing.
    ///
    /// Nulls coerce to the empty sentinel; integral floats render as
    /// integers so `7` and `7.0` are the same value.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => {
                #[allow(clippy::cast_possible_truncation)]
                if f.fract() == 0.0 && f.abs() < 9e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Interpret this cell as a size quantity.
    ///
    /// Returns `None` for nulls and non-numeric text; numeric text and
    /// integral floats are accepted.
    #[must_use]
    pub fn as_qty(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 9e15 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True for nulls and values canonicalizing to the empty sentinel
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical().is_empty()
    }
}

/// One wide source row, keyed by column name with source column order
/// preserved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    values: serde_json::Map<String, Value>,
}

impl SourceRow {
    /// Build a row from a JSON object
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(Error::InvalidInput(format!(
                "source row must be a JSON object, got {other}"
            ))),
        }
    }

    /// Parse an array of rows from a JSON document
    pub fn rows_from_json(value: Value) -> Result<Vec<Self>> {
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_json).collect(),
            other => Err(Error::InvalidInput(format!(
                "source document must be a JSON array of row objects, got {other}"
            ))),
        }
    }

    /// Column names in source order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Normalized cell for a column; absent columns read as `Null`
    #[must_use]
    pub fn get(&self, column: &str) -> CellValue {
        self.values
            .get(column)
            .map_or(CellValue::Null, CellValue::from_json)
    }

    /// Canonical text for a column, `None` when blank
    #[must_use]
    pub fn text(&self, column: &str) -> Option<String> {
        let value = self.get(column).canonical();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// The staged content as a JSON object, column order intact
    #[must_use]
    pub fn as_content(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// An all-blank key-and-quantity row carries nothing worth merging and
    /// is discarded upstream of the hasher.
    #[must_use]
    pub fn is_blank(&self, key_columns: &[&str], size_columns: &[String]) -> bool {
        let keys_blank = key_columns.iter().all(|col| self.get(col).is_empty());
        let qtys_blank = size_columns
            .iter()
            .all(|col| self.get(col).as_qty().unwrap_or(0) <= 0);
        keys_blank && qtys_blank
    }
}
