//! Lifecycle callbacks run around the caller's own writes.
//!
//! The caller owns the transaction and the insert/update/delete statement.
//! The expected sequence per write is:
//!
//! | write  | before the statement                          | after the statement |
//! |--------|-----------------------------------------------|---------------------|
//! | create | `check_top_position`, `before_create`         |                     |
//! | update | `check_top_position`, `before_update`         | `after_update`      |
//! | delete | `before_destroy`                              | `after_destroy`     |
//!
//! `before_*` callbacks may change the record's pending position, which the
//! caller must then write. [`crate::hooks::ListHooks`] runs the same sequence
//! for every ordered column of a table.

use sqlx::AnyConnection;

use super::{ListError, PositionList};
use crate::Result;
use crate::backend;
use crate::config::AddNewAt;
use crate::constants::TEMPORARY_POSITION_GAP;
use crate::mutator;
use crate::query;
use crate::record::{Record, Value};
use crate::scope::Snapshot;

/// Outcome of [`PositionList::before_update`], handed to
/// [`PositionList::after_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeTransition {
    /// The record stays in its list.
    #[default]
    Unchanged,
    /// The record left its old list and was placed in the new one.
    Moved,
}

impl PositionList {
    /// Clamp a pending position below `top` up to `top`.
    ///
    /// A pending position equal to the column default is left alone so
    /// placement can still recognise it.
    pub fn check_top_position(&self, record: &mut Record) -> Result<()> {
        if let Some(position) = self.position_of(record)?
            && position < self.column.top()
            && !self.is_default_position(record)?
        {
            record.set(self.column.column(), self.column.top());
        }
        Ok(())
    }

    /// Place a record that is about to be inserted.
    ///
    /// Unpositioned records (or ones still at the default position) go
    /// where `add_new_at` says. An explicit position makes room for itself
    /// by moving the items at and below it down.
    pub async fn before_create(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        let assume_default = self.assume_default_position(record, false)?;
        self.add_to_list(conn, record, assume_default, false).await
    }

    /// Move a record whose scope is about to change.
    ///
    /// Locks the row, closes the gap it leaves in its old list and places
    /// it in the new one. Does nothing unless a scope key changed.
    ///
    /// # Errors
    ///
    /// `ListError::StaleScope` if the stored scope no longer matches the
    /// record's persisted values.
    pub async fn before_update(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
    ) -> Result<ScopeTransition> {
        if !self.config().scope.changed(record) {
            return Ok(ScopeTransition::Unchanged);
        }
        let id = record.require_id()?;
        backend::lock_row(conn, self.store.kind(), self.config(), id).await?;

        let stored = query::reload(conn, &self.column, id).await?;
        for (column, value) in &stored.scope {
            if record.was(column) != value {
                return Err(ListError::StaleScope {
                    id,
                    column: column.clone(),
                }
                .into());
            }
        }

        // Parking rewrites the stored position, so placement is decided first.
        let assume_default = self.assume_default_position(record, true)?;
        let old_scope = self.scope(record, Snapshot::Persisted);
        if let Some(old_position) = stored.position {
            if self.column.sequential() {
                let bottom = query::bottom_position(conn, &self.column, &old_scope, None).await?;
                let parked = bottom + TEMPORARY_POSITION_GAP;
                mutator::set_position(conn, &self.column, id, Some(parked)).await?;
                record.refresh(self.column.column(), parked);
            }
            let lower = old_scope
                .gt(self.column.column(), old_position)
                .exclude(self.column.primary_key(), Some(id));
            mutator::decrement_all(conn, &self.column, &lower).await?;
        }

        self.add_to_list(conn, record, assume_default, true).await?;
        tracing::debug!(
            table = self.column.table(),
            id,
            old_position = ?stored.position,
            new_position = ?self.position_of(record)?,
            "Moved record to a new scope"
        );
        Ok(ScopeTransition::Moved)
    }

    /// Resolve a collision left by an explicit position change.
    ///
    /// Runs after the caller wrote the record. If another row now shares
    /// the record's new position, the items between the old and new
    /// positions shift to make room.
    pub async fn after_update(
        &self,
        conn: &mut AnyConnection,
        record: &Record,
        transition: ScopeTransition,
    ) -> Result<()> {
        if transition == ScopeTransition::Moved || !record.changed(self.column.column()) {
            return Ok(());
        }
        let Some(new) = self.position_of(record)? else {
            return Ok(());
        };
        let id = record.require_id()?;
        let scope = self.scope(record, Snapshot::Current);
        if query::range_count(conn, &self.column, &scope, new, new, Some(id)).await? == 0 {
            return Ok(());
        }

        let old = match record.was_int(self.column.column())? {
            Some(old) => old,
            None => query::bottom_position(conn, &self.column, &scope, Some(id)).await? + 1,
        };
        self.shuffle(conn, &scope, old, new, Some(id)).await
    }

    /// Lock a record about to be deleted and reload its list columns.
    pub async fn before_destroy(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        let id = record.require_id()?;
        backend::lock_row(conn, self.store.kind(), self.config(), id).await?;

        let stored = query::reload(conn, &self.column, id).await?;
        record.refresh(self.column.column(), stored.position);
        for (column, value) in stored.scope {
            record.refresh(&column, value);
        }
        Ok(())
    }

    /// Close the gap left by a deleted record.
    ///
    /// Skipped when the record is deleted through the owner of its scope,
    /// since the whole list goes with it.
    pub async fn after_destroy(&self, conn: &mut AnyConnection, record: &Record) -> Result<()> {
        if self.config().scope.destroyed_via_scope(record) {
            tracing::trace!(table = self.column.table(), "Skipping gap close for cascaded delete");
            return Ok(());
        }
        let Some(position) = record.was_int(self.column.column())? else {
            return Ok(());
        };
        let lower = self
            .scope(record, Snapshot::Persisted)
            .gt(self.column.column(), position)
            .exclude(self.column.primary_key(), record.id());
        mutator::decrement_all(conn, &self.column, &lower).await?;
        Ok(())
    }

    async fn add_to_list(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
        assume_default: bool,
        scope_changed: bool,
    ) -> Result<()> {
        let column = self.column.column();
        let id = record.id();
        let scope = self.scope(record, Snapshot::Current);

        if assume_default {
            match self.config().add_new_at {
                AddNewAt::Top => {
                    let all = scope.exclude(self.column.primary_key(), id);
                    mutator::increment_all(conn, &self.column, &all).await?;
                    record.set(column, self.column.top());
                }
                AddNewAt::Bottom => {
                    let bottom = query::bottom_position(conn, &self.column, &scope, id).await?;
                    record.set(column, bottom + 1);
                }
                AddNewAt::Disabled => {
                    if scope_changed {
                        record.set(column, Value::Null);
                    }
                }
            }
        } else if let Some(position) = self.position_of(record)? {
            let lower = scope
                .ge(column, position)
                .exclude(self.column.primary_key(), id);
            mutator::increment_all(conn, &self.column, &lower).await?;
        }
        Ok(())
    }

    /// Check if placement should ignore the record's pending position.
    fn assume_default_position(&self, record: &Record, scope_changed: bool) -> Result<bool> {
        Ok(self.not_in_list(record)?
            || (scope_changed && !record.changed(self.column.column()))
            || self.is_default_position(record)?)
    }
}
