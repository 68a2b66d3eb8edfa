//! Record model consumed by the list engine.
//!
//! The engine does not own rows. Applications hand it a [`Record`]: the
//! primary key, the current attribute values, and a snapshot of the values
//! last written to the store. The difference between the two is how scope
//! changes and explicit position assignments are detected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::list::ListError;

/// A single attribute value as stored in a list table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Integer column value.
    Int(i64),
    /// Text column value.
    Text(String),
}

impl Value {
    /// Check if this value is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the text payload, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Int)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

static NULL: Value = Value::Null;

/// A row of a list table as seen by the engine.
///
/// Attribute reads of unknown columns return `NULL`.
///
/// # Example
///
/// ```
/// use listrank::{Record, Value};
///
/// let mut record = Record::persisted(7, [("list_id", Value::Int(1)), ("position", Value::Int(3))]);
/// record.set("list_id", 2);
/// assert!(record.changed("list_id"));
/// assert_eq!(record.was("list_id"), &Value::Int(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    id: Option<i64>,
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    persisted: BTreeMap<String, Value>,
    #[serde(default)]
    destroyed_by: Option<String>,
}

impl Record {
    /// Create a record that has not been written to the store yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record mirroring a stored row.
    ///
    /// The given attributes become both the current and the persisted values.
    pub fn persisted<K, V>(id: i64, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let attributes: BTreeMap<String, Value> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            id: Some(id),
            persisted: attributes.clone(),
            attributes,
            destroyed_by: None,
        }
    }

    /// Builder-style attribute assignment.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Primary key, `None` while the record is new.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Primary key of a stored record.
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| ListError::NotPersisted.into())
    }

    /// Assign the primary key once the row has been inserted.
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// Check if the record has not been written yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Current value of a column.
    pub fn get(&self, column: &str) -> &Value {
        self.attributes.get(column).unwrap_or(&NULL)
    }

    /// Current value of an integer column.
    pub fn get_int(&self, column: &str) -> Result<Option<i64>> {
        int_value(column, self.get(column))
    }

    /// Value of a column as of the last write.
    pub fn was(&self, column: &str) -> &Value {
        self.persisted.get(column).unwrap_or(&NULL)
    }

    /// Integer value of a column as of the last write.
    pub fn was_int(&self, column: &str) -> Result<Option<i64>> {
        int_value(column, self.was(column))
    }

    /// Set the current value of a column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(column.into(), value.into());
    }

    /// Set a column in both the current and the persisted view.
    ///
    /// Used after the engine writes a column directly.
    pub fn set_persisted(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        self.persisted.insert(column.to_string(), value.clone());
        self.attributes.insert(column.to_string(), value);
    }

    /// Replace the persisted value of a column with one re-read from the store.
    ///
    /// A column without a pending change takes the new value as its current
    /// value too; a pending change is kept.
    pub fn refresh(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        if !self.changed(column) {
            self.attributes.insert(column.to_string(), value.clone());
        }
        self.persisted.insert(column.to_string(), value);
    }

    /// Check if a column differs from its persisted value.
    ///
    /// New records report every non-null attribute as changed.
    pub fn changed(&self, column: &str) -> bool {
        self.get(column) != self.was(column)
    }

    /// Names of all columns with pending changes.
    pub fn changed_columns(&self) -> Vec<&str> {
        self.attributes
            .keys()
            .chain(self.persisted.keys())
            .map(String::as_str)
            .filter(|column| self.changed(column))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Accept all pending values as written.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.attributes.clone();
    }

    /// Record that this row is being deleted because of the row referenced by
    /// `foreign_key` being deleted.
    pub fn mark_destroyed_by(&mut self, foreign_key: impl Into<String>) {
        self.destroyed_by = Some(foreign_key.into());
    }

    /// Foreign key whose owner's deletion is cascading to this record.
    pub fn destroyed_by(&self) -> Option<&str> {
        self.destroyed_by.as_deref()
    }

    /// Iterate over the current attributes in column order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn int_value(column: &str, value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        Value::Text(_) => Err(ListError::InvalidValue {
            column: column.to_string(),
            value: value.clone(),
        }
        .into()),
    }
}
