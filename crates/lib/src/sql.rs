//! Parameterized SQL construction for list queries.
//!
//! Every value reaches the database as a bound parameter. Identifiers
//! (table and column names) come from configuration, are validated once and
//! are always quoted when rendered.

use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;

use crate::Result;
use crate::backend::StoreError;
use crate::record::Value;

/// Check that `identifier` is a plain SQL identifier.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier {
            identifier: identifier.to_string(),
        }
        .into())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// Ordering comparison against an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// One conjunct of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column = value`
    Eq(String, Value),
    /// `column IS NULL`
    IsNull(String),
    /// `column IS NOT NULL`
    NotNull(String),
    /// `column <op> value`
    Compare(String, Comparison, i64),
    /// `column <> value`
    NotEq(String, i64),
}

/// A conjunction of conditions over a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Create an empty filter matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality test. `NULL` values compare with `IS NULL`.
    pub fn eq(mut self, column: &str, value: Value) -> Self {
        let condition = match value {
            Value::Null => Condition::IsNull(column.to_string()),
            value => Condition::Eq(column.to_string(), value),
        };
        self.conditions.push(condition);
        self
    }

    /// Require a non-null column.
    pub fn not_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::NotNull(column.to_string()));
        self
    }

    /// Add an ordering comparison.
    pub fn compare(mut self, column: &str, comparison: Comparison, value: i64) -> Self {
        self.conditions
            .push(Condition::Compare(column.to_string(), comparison, value));
        self
    }

    /// `column > value`
    pub fn gt(self, column: &str, value: i64) -> Self {
        self.compare(column, Comparison::Gt, value)
    }

    /// `column >= value`
    pub fn ge(self, column: &str, value: i64) -> Self {
        self.compare(column, Comparison::Ge, value)
    }

    /// `column < value`
    pub fn lt(self, column: &str, value: i64) -> Self {
        self.compare(column, Comparison::Lt, value)
    }

    /// `column <= value`
    pub fn le(self, column: &str, value: i64) -> Self {
        self.compare(column, Comparison::Le, value)
    }

    /// Exclude a primary key, if one is given.
    pub fn exclude(mut self, primary_key: &str, id: Option<i64>) -> Self {
        if let Some(id) = id {
            self.conditions
                .push(Condition::NotEq(primary_key.to_string(), id));
        }
        self
    }

    /// The conditions of this filter, in order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Check if the filter matches every row.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// SQL text with its bound values, numbered `$1..$n` in push order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    pub(crate) fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn push_ident(&mut self, identifier: &str) -> &mut Self {
        self.sql.push_str(&quote(identifier));
        self
    }

    pub(crate) fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.binds.push(value.into());
        let placeholder = format!("${}", self.binds.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append ` WHERE ...` for a non-empty filter.
    pub(crate) fn push_where(&mut self, filter: &Filter) -> &mut Self {
        for (i, condition) in filter.conditions().iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Eq(column, value) => {
                    self.push_ident(column).push(" = ").push_bind(value.clone());
                }
                Condition::IsNull(column) => {
                    self.push_ident(column).push(" IS NULL");
                }
                Condition::NotNull(column) => {
                    self.push_ident(column).push(" IS NOT NULL");
                }
                Condition::Compare(column, comparison, value) => {
                    self.push_ident(column)
                        .push(" ")
                        .push(comparison.as_sql())
                        .push(" ")
                        .push_bind(*value);
                }
                Condition::NotEq(column, value) => {
                    self.push_ident(column).push(" <> ").push_bind(*value);
                }
            }
        }
        self
    }

    #[cfg(test)]
    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    /// Build a sqlx query with every value bound.
    pub(crate) fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for value in &self.binds {
            query = match value {
                Value::Null => query.bind(None::<i64>),
                Value::Int(i) => query.bind(*i),
                Value::Text(s) => query.bind(s.as_str()),
            };
        }
        query
    }
}
