//! Store error types for the listrank backend.
//!
//! This module defines structured error types for database operations,
//! providing better error context and type safety compared to string-based errors.

use thiserror::Error;

/// Errors that can occur while talking to the SQL store.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Generic sqlx failure with context.
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Context and message of the failure
        reason: String,
        /// The underlying sqlx error, if any
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A write violated a unique constraint.
    ///
    /// Bulk shifting a position column that carries a unique index ends here.
    #[error("Unique constraint violated: {reason}")]
    ConstraintViolation {
        /// Context and message of the failure
        reason: String,
        /// The underlying sqlx error
        #[source]
        source: sqlx::Error,
    },

    /// No row exists for the given primary key.
    #[error("Record {id} not found in table {table}")]
    RecordNotFound {
        /// Table that was searched
        table: String,
        /// Primary key that was not found
        id: i64,
    },

    /// A table or column name is not a plain SQL identifier.
    #[error("Invalid SQL identifier: {identifier:?}")]
    InvalidIdentifier {
        /// The rejected identifier
        identifier: String,
    },
}

impl StoreError {
    /// Wrap a sqlx error, classifying unique constraint violations.
    pub(crate) fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique {
            StoreError::ConstraintViolation {
                reason: format!("{context}: {err}"),
                source: err,
            }
        } else {
            StoreError::SqlxError {
                reason: format!("{context}: {err}"),
                source: Some(err),
            }
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RecordNotFound { .. })
    }

    /// Check if this error is a unique constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }

    /// Check if this error comes from the configuration rather than the store.
    pub fn is_config_error(&self) -> bool {
        matches!(self, StoreError::InvalidIdentifier { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from_sqlx("Database error", err)
    }
}

impl From<sqlx::Error> for crate::Error {
    fn from(err: sqlx::Error) -> Self {
        crate::Error::Backend(err.into())
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Backend(err)
    }
}
