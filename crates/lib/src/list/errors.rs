//! Error types for list operations.

use thiserror::Error;

use crate::record::Value;

/// Errors raised by the list engine itself, as opposed to the store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ListError {
    /// Requested position lies outside `[top, bottom + 1]` of the scope.
    #[error("Position {position} is outside the list range {top}..={max}")]
    InvalidTargetPosition {
        /// The requested position
        position: i64,
        /// Lowest valid position
        top: i64,
        /// Highest valid position
        max: i64,
    },

    /// The stored scope no longer matches the record's persisted snapshot.
    ///
    /// Another writer changed the scope columns between load and save.
    #[error("Stored scope of record {id} changed concurrently (column {column})")]
    StaleScope {
        /// Primary key of the record
        id: i64,
        /// First scope column found to differ
        column: String,
    },

    /// The operation needs a stored record but got a new one.
    #[error("Record has not been persisted")]
    NotPersisted,

    /// A column holds a value of the wrong type.
    #[error("Column {column} holds unexpected value {value}")]
    InvalidValue {
        /// Column name
        column: String,
        /// Offending value
        value: Value,
    },

    /// Configuration is unusable.
    #[error("Invalid list configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem
        reason: String,
    },
}

impl ListError {
    /// Check if this error was caused by caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ListError::InvalidTargetPosition { .. }
                | ListError::NotPersisted
                | ListError::InvalidValue { .. }
        )
    }

    /// Check if this error indicates a concurrent modification.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ListError::StaleScope { .. })
    }
}

impl From<ListError> for crate::Error {
    fn from(err: ListError) -> Self {
        crate::Error::List(err)
    }
}
