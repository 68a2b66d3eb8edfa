//! Per-column list configuration.
//!
//! One [`ListConfig`] describes one ordered column. An entity with several
//! independently ordered columns gets one config (and one
//! [`crate::list::PositionList`]) per column.
//!
//! Configs can be built in code or deserialized:
//!
//! ```
//! use listrank::config::{AddNewAt, ListConfig};
//! use listrank::scope::Scope;
//!
//! let config = ListConfig::from_json(r#"{
//!     "table": "todo_items",
//!     "scope": {"column": "todo_list_id"},
//!     "add_new_at": "top"
//! }"#).unwrap();
//! assert_eq!(config.scope, Scope::column("todo_list_id"));
//! assert_eq!(config.add_new_at, AddNewAt::Top);
//! assert_eq!(config.column, "position");
//! assert_eq!(config.top, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::constants::{DEFAULT_POSITION_COLUMN, DEFAULT_PRIMARY_KEY, DEFAULT_TOP};
use crate::list::ListError;
use crate::scope::Scope;
use crate::sql::validate_identifier;

/// Where newly created records are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddNewAt {
    /// First position; every existing item moves down.
    Top,
    /// After the current last item.
    #[default]
    Bottom,
    /// Leave new records unpositioned.
    #[serde(rename = "none")]
    Disabled,
}

/// How range shifts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequentialUpdates {
    /// Row by row if a unique index covers exactly the position column.
    #[default]
    Auto,
    /// Always row by row.
    Always,
    /// Always one bulk statement.
    Never,
}

impl SequentialUpdates {
    /// The forced mode, or `None` when it has to be detected.
    pub fn explicit(self) -> Option<bool> {
        match self {
            SequentialUpdates::Auto => None,
            SequentialUpdates::Always => Some(true),
            SequentialUpdates::Never => Some(false),
        }
    }
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_position_column() -> String {
    DEFAULT_POSITION_COLUMN.to_string()
}

fn default_top() -> i64 {
    DEFAULT_TOP
}

/// Configuration of one ordered column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// Table holding the list items.
    pub table: String,
    /// Integer primary key column.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Position column.
    #[serde(default = "default_position_column")]
    pub column: String,
    /// Which rows share a list.
    #[serde(default)]
    pub scope: Scope,
    /// Position of the first item.
    #[serde(default = "default_top")]
    pub top: i64,
    /// Placement of new records.
    #[serde(default)]
    pub add_new_at: AddNewAt,
    /// Row-by-row versus bulk shifting.
    #[serde(default)]
    pub sequential_updates: SequentialUpdates,
    /// Schema default of the position column.
    ///
    /// When unset it is read from the table definition during setup.
    #[serde(default)]
    pub default_position: Option<i64>,
}

impl ListConfig {
    /// Config for `table` with every other field at its default.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: default_primary_key(),
            column: default_position_column(),
            scope: Scope::All,
            top: DEFAULT_TOP,
            add_new_at: AddNewAt::default(),
            sequential_updates: SequentialUpdates::default(),
            default_position: None,
        }
    }

    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ListConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the position column.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Set the primary key column.
    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Set the scope.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the first position.
    pub fn top(mut self, top: i64) -> Self {
        self.top = top;
        self
    }

    /// Set where new records go.
    pub fn add_new_at(mut self, add_new_at: AddNewAt) -> Self {
        self.add_new_at = add_new_at;
        self
    }

    /// Set the shifting strategy.
    pub fn sequential_updates(mut self, sequential_updates: SequentialUpdates) -> Self {
        self.sequential_updates = sequential_updates;
        self
    }

    /// Override the schema default of the position column.
    pub fn default_position(mut self, default_position: i64) -> Self {
        self.default_position = Some(default_position);
        self
    }

    /// Check identifiers and scope consistency.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.primary_key)?;
        validate_identifier(&self.column)?;
        self.scope.validate()?;

        for column in self.scope.referenced_columns() {
            if column == self.column || column == self.primary_key {
                return Err(ListError::InvalidConfig {
                    reason: format!("scope column {column} is also the position or primary key"),
                }
                .into());
            }
        }
        if self.column == self.primary_key {
            return Err(ListError::InvalidConfig {
                reason: "position column cannot be the primary key".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// A [`ListConfig`] with its store-dependent settings resolved.
///
/// Built once by [`crate::list::PositionList::setup`]; nothing is looked up
/// again afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    config: ListConfig,
    sequential: bool,
    default_position: Option<i64>,
}

impl ResolvedColumn {
    /// Combine a config with its resolved settings.
    pub fn new(config: ListConfig, sequential: bool, default_position: Option<i64>) -> Self {
        Self {
            config,
            sequential,
            default_position,
        }
    }

    /// The underlying configuration.
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Whether shifts must be written row by row.
    pub fn sequential(&self) -> bool {
        self.sequential
    }

    /// Default value of the position column, from config or schema.
    pub fn default_position(&self) -> Option<i64> {
        self.default_position
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &str {
        &self.config.primary_key
    }

    /// Position column.
    pub fn column(&self) -> &str {
        &self.config.column
    }

    /// First position.
    pub fn top(&self) -> i64 {
        self.config.top
    }
}
