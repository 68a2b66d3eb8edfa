//!
//! Listrank: scoped, gap-free list positions over a transactional SQL store.
//!
//! Rows of an application table are kept in user-defined order by an integer
//! position column. Within each scope the positions of listed rows always form
//! the contiguous range `top, top + 1, ...` with no duplicates, and every
//! operation either commits that state or leaves the list untouched.
//!
//! ## Core Concepts
//!
//! * **Store (`backend::ListStore`)**: A sqlx `Any` pool over SQLite or PostgreSQL.
//! * **Config (`config::ListConfig`)**: Table, position column, scope and placement of one ordered column.
//! * **Scope (`scope::Scope`)**: Which rows share a list: the whole table, one or more key columns, or a fixed filter.
//! * **Record (`record::Record`)**: The application's row as the engine sees it: primary key, pending values and last-written values.
//! * **PositionList (`list::PositionList`)**: Direct list operations (`insert_at`, `move_to_top`, `remove_from_list`, ...) and lifecycle callbacks for one column.
//! * **Hooks (`hooks::ListHooks`)**: Runs the lifecycle callbacks of every ordered column of a table around the application's own writes.
//! * **Shifting**: Range moves are one bulk `UPDATE`, or row by row when a unique index covers the position column.

pub mod backend;
pub mod config;
pub mod constants;
pub mod hooks;
pub mod list;
pub mod mutator;
pub mod query;
pub mod record;
pub mod scope;
pub mod sql;

pub use backend::{DbKind, ListStore, StoreError};
pub use config::{AddNewAt, ListConfig, SequentialUpdates};
pub use hooks::{ListCallbacks, ListHooks, UpdateTicket};
pub use list::{ListError, PositionList, ScopeTransition};
pub use query::PositionedRow;
pub use record::{Record, Value};
pub use scope::Scope;

/// Result type used throughout the listrank library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the listrank library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured store errors from the backend module
    #[error(transparent)]
    Backend(backend::StoreError),

    /// Structured list errors from the list module
    #[error(transparent)]
    List(list::ListError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Backend(_) => "backend",
            Error::List(_) => "list",
        }
    }

    /// Check if this error indicates a row was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Backend(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a unique constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Error::Backend(store_err) => store_err.is_constraint_violation(),
            _ => false,
        }
    }

    /// Check if this error indicates a concurrent modification.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::List(list_err) => list_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error was caused by caller input.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Error::List(list_err) => list_err.is_invalid_input(),
            _ => false,
        }
    }

    /// Check if this error comes from configuration.
    pub fn is_config_error(&self) -> bool {
        match self {
            Error::Serialize(_) => true,
            Error::Backend(store_err) => store_err.is_config_error(),
            Error::List(list_err) => matches!(list_err, list::ListError::InvalidConfig { .. }),
        }
    }

    /// Check if this error is store-related.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}
