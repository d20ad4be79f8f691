//! Record Model
//!
//! Rows read from a legacy table store are loosely typed: the column set is
//! only known at read time, and values are one of a small set of scalars.
//! A [`Record`] keeps its fields in a sorted map so that field order never
//! influences comparison or hashing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar cell value.
///
/// Serialized untagged so records render as plain JSON objects
/// (`{"id": 7, "name": "Acme", "issued": "2024-03-01", "memo": null}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Canonical textual form, used for key derivation and fingerprinting.
    pub fn canonical(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Number(n) => format!("{}", n),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

/// A row as read from the source: field name to scalar value.
///
/// Backed by a `BTreeMap`, so iteration order is always sorted by field name
/// regardless of the order the source delivered the columns in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[allow(dead_code)]
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the textual primary key from the given field.
    ///
    /// Returns `None` when the field is missing, null, or renders to an
    /// empty string - such rows are skipped by the change detector.
    pub fn key_text(&self, field: &str) -> Option<String> {
        let value = self.0.get(field)?;
        if value.is_null() {
            return None;
        }
        let text = value.canonical();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
