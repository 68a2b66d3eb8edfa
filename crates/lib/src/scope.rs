//! Scope resolution: which records share a list with a given record.
//!
//! A [`Scope`] is one of four variants. Key-based scopes (`Column`,
//! `Columns`) derive their filter from the record's attribute values and can
//! tell when those values change. `Filter` scopes are a fixed conjunction of
//! `column = value` conditions; they never report a change and never treat a
//! deletion as a cascade.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::record::{Record, Value};
use crate::sql::{Filter, validate_identifier};

/// Which view of a record's attributes to build a scope from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    /// Pending, possibly unsaved values.
    Current,
    /// Values as of the last write.
    Persisted,
}

/// Scope definition of a position column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The whole table is one list.
    #[default]
    All,
    /// Records sharing the value of a single key column.
    Column(String),
    /// Records sharing the values of every listed key column.
    Columns(Vec<String>),
    /// Records matching a fixed set of `column = value` conditions.
    Filter(Vec<(String, Value)>),
}

impl Scope {
    /// Scope by a single key column.
    pub fn column(name: impl Into<String>) -> Self {
        Scope::Column(name.into())
    }

    /// Scope by a composite key.
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scope::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Scope by fixed parameterized conditions.
    pub fn filter<I, K, V>(conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Scope::Filter(
            conditions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Columns whose values define list membership.
    ///
    /// Empty for `All` and `Filter` scopes.
    pub fn key_columns(&self) -> &[String] {
        match self {
            Scope::All | Scope::Filter(_) => &[],
            Scope::Column(column) => std::slice::from_ref(column),
            Scope::Columns(columns) => columns,
        }
    }

    /// Every column the scope reads, key or filter.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            Scope::Filter(conditions) => conditions.iter().map(|(c, _)| c.as_str()).collect(),
            _ => self.key_columns().iter().map(String::as_str).collect(),
        }
    }

    /// Membership filter for the list `record` belongs to.
    pub fn filter_for(&self, record: &Record, snapshot: Snapshot) -> Filter {
        match self {
            Scope::All => Filter::new(),
            Scope::Filter(conditions) => conditions
                .iter()
                .fold(Filter::new(), |f, (column, value)| f.eq(column, value.clone())),
            Scope::Column(_) | Scope::Columns(_) => {
                self.key_columns().iter().fold(Filter::new(), |f, column| {
                    let value = match snapshot {
                        Snapshot::Current => record.get(column),
                        Snapshot::Persisted => record.was(column),
                    };
                    f.eq(column, value.clone())
                })
            }
        }
    }

    /// Check if a stored record's scope key has pending changes.
    ///
    /// New records have no previous scope, and `All`/`Filter` scopes cannot
    /// change, so both report `false`.
    pub fn changed(&self, record: &Record) -> bool {
        !record.is_new()
            && self
                .key_columns()
                .iter()
                .any(|column| record.changed(column))
    }

    /// Check if the record is being deleted because its scope owner is.
    pub fn destroyed_via_scope(&self, record: &Record) -> bool {
        match record.destroyed_by() {
            Some(foreign_key) => self.key_columns().iter().any(|c| c == foreign_key),
            None => false,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Scope::Columns(columns) = self
            && columns.is_empty()
        {
            return Err(crate::list::ListError::InvalidConfig {
                reason: "composite scope needs at least one column".to_string(),
            }
            .into());
        }
        for column in self.referenced_columns() {
            validate_identifier(column)?;
        }
        Ok(())
    }
}
