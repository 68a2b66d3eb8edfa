//! Constants used throughout the listrank library.
//!
//! Central definitions for the defaults applied when a [`crate::config::ListConfig`]
//! leaves a field unset.

/// Default primary key column of a list table.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Default position column.
pub const DEFAULT_POSITION_COLUMN: &str = "position";

/// Position assigned to the first item of a list unless configured otherwise.
pub const DEFAULT_TOP: i64 = 1;

/// Distance past the current bottom used to park an item mid-move.
///
/// Must leave room for one increment of every other item in the scope.
pub const TEMPORARY_POSITION_GAP: i64 = 2;
