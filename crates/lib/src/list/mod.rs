//! List operations over one position column.
//!
//! A [`PositionList`] is built once per ordered column with
//! [`PositionList::setup`], which resolves the column's shifting strategy and
//! default position against the store. It then offers two families of
//! operations:
//!
//! - **direct operations** (`insert_at`, `move_lower`, `move_to_top`,
//!   `remove_from_list`, ...). Each runs in its own transaction, locks the
//!   record's row, reloads its position and scope, and commits. On error
//!   the transaction rolls back and the caller's record is left untouched.
//! - **lifecycle callbacks** (`before_create`, `before_update`, ...), see
//!   [`callbacks`]. These run on the caller's connection inside the
//!   caller's transaction, around the caller's own insert/update/delete.
//!
//! # Example
//!
//! ```ignore
//! use listrank::{ListConfig, ListStore, PositionList, Scope};
//!
//! let store = ListStore::sqlite_in_memory().await?;
//! let list = PositionList::setup(
//!     &store,
//!     ListConfig::new("todo_items").scope(Scope::column("todo_list_id")),
//! )
//! .await?;
//!
//! list.move_to_top(&mut item).await?;
//! ```

pub mod callbacks;
mod errors;

use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, Transaction};

use crate::Result;
use crate::backend::{self, ListStore, SqlxResultExt, schema};
use crate::config::{ListConfig, ResolvedColumn};
use crate::constants::TEMPORARY_POSITION_GAP;
use crate::mutator;
use crate::query::{self, PositionedRow};
use crate::record::Record;
use crate::scope::Snapshot;
use crate::sql::Filter;

pub use callbacks::ScopeTransition;
pub use errors::ListError;

/// Position maintenance for one ordered column.
#[derive(Debug, Clone)]
pub struct PositionList {
    store: ListStore,
    column: ResolvedColumn,
}

impl PositionList {
    /// Validate `config` and resolve its store-dependent settings.
    ///
    /// Shifting is sequential when forced by config, or when the table exists
    /// and a unique index covers exactly the position column. The default
    /// position comes from config, else from the column definition.
    pub async fn setup(store: &ListStore, config: ListConfig) -> Result<Self> {
        config.validate()?;
        let mut conn = acquire(store).await?;
        let kind = store.kind();

        let sequential = match config.sequential_updates.explicit() {
            Some(forced) => forced,
            None => {
                schema::table_exists(&mut conn, kind, &config.table).await?
                    && schema::has_unique_index(&mut conn, kind, &config.table, &config.column)
                        .await?
            }
        };
        let default_position = match config.default_position {
            Some(default_position) => Some(default_position),
            None => schema::column_default(&mut conn, kind, &config.table, &config.column).await?,
        };

        tracing::debug!(
            table = %config.table,
            column = %config.column,
            sequential,
            ?default_position,
            "Resolved list column"
        );

        Ok(Self {
            store: store.clone(),
            column: ResolvedColumn::new(config, sequential, default_position),
        })
    }

    /// The store this list writes to.
    pub fn store(&self) -> &ListStore {
        &self.store
    }

    /// Resolved column settings.
    pub fn column(&self) -> &ResolvedColumn {
        &self.column
    }

    /// The configuration this list was set up with.
    pub fn config(&self) -> &ListConfig {
        self.column.config()
    }

    /// Whether range shifts are written row by row.
    pub fn sequential_updates(&self) -> bool {
        self.column.sequential()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicates
    // ═══════════════════════════════════════════════════════════════════════

    /// Current position of `record` in this list.
    pub fn position_of(&self, record: &Record) -> Result<Option<i64>> {
        record.get_int(self.column.column())
    }

    /// Check if `record` has a position.
    pub fn in_list(&self, record: &Record) -> Result<bool> {
        Ok(self.position_of(record)?.is_some())
    }

    /// Check if `record` has no position.
    pub fn not_in_list(&self, record: &Record) -> Result<bool> {
        Ok(self.position_of(record)?.is_none())
    }

    /// Check if `record`'s position is still the column default.
    pub fn is_default_position(&self, record: &Record) -> Result<bool> {
        Ok(match (self.column.default_position(), self.position_of(record)?) {
            (Some(default), Some(position)) => default == position,
            _ => false,
        })
    }

    /// Check if `record` is listed and nothing is above it.
    pub async fn is_first(&self, record: &Record) -> Result<bool> {
        Ok(self.in_list(record)? && self.higher_item(record).await?.is_none())
    }

    /// Check if `record` is listed and nothing is below it.
    pub async fn is_last(&self, record: &Record) -> Result<bool> {
        Ok(self.in_list(record)? && self.lower_item(record).await?.is_none())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════

    /// The nearest item above `record`.
    pub async fn higher_item(&self, record: &Record) -> Result<Option<PositionedRow>> {
        Ok(self.higher_items(record, Some(1)).await?.into_iter().next())
    }

    /// Items above `record`, nearest first.
    pub async fn higher_items(
        &self,
        record: &Record,
        limit: Option<usize>,
    ) -> Result<Vec<PositionedRow>> {
        let Some(position) = self.position_of(record)? else {
            return Ok(Vec::new());
        };
        let mut conn = acquire(&self.store).await?;
        let scope = self.scope(record, Snapshot::Current);
        query::items_above(&mut conn, &self.column, &scope, position, record.id(), limit).await
    }

    /// The nearest item below `record`.
    pub async fn lower_item(&self, record: &Record) -> Result<Option<PositionedRow>> {
        Ok(self.lower_items(record, Some(1)).await?.into_iter().next())
    }

    /// Items below `record`, nearest first.
    pub async fn lower_items(
        &self,
        record: &Record,
        limit: Option<usize>,
    ) -> Result<Vec<PositionedRow>> {
        let Some(position) = self.position_of(record)? else {
            return Ok(Vec::new());
        };
        let mut conn = acquire(&self.store).await?;
        let scope = self.scope(record, Snapshot::Current);
        query::items_below(&mut conn, &self.column, &scope, position, record.id(), limit).await
    }

    /// Highest position in `record`'s list, `top - 1` when empty.
    pub async fn bottom_position(&self, record: &Record) -> Result<i64> {
        let mut conn = acquire(&self.store).await?;
        let scope = self.scope(record, Snapshot::Current);
        query::bottom_position(&mut conn, &self.column, &scope, None).await
    }

    /// Every listed row sharing `record`'s scope, in order.
    pub async fn positions(&self, record: &Record) -> Result<Vec<PositionedRow>> {
        let mut conn = acquire(&self.store).await?;
        let scope = self.scope(record, Snapshot::Current);
        query::positions(&mut conn, &self.column, &scope).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Direct operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Put `record` at `position`, moving the items in between.
    ///
    /// A new record only gets the position assigned; the shift happens when
    /// it is created (see [`PositionList::before_create`]).
    ///
    /// # Errors
    ///
    /// `ListError::InvalidTargetPosition` unless `top <= position <= top + n`,
    /// where `n` counts the other listed items in `record`'s scope.
    pub async fn insert_at(&self, record: &mut Record, position: i64) -> Result<()> {
        if record.is_new() {
            let mut conn = acquire(&self.store).await?;
            let scope = self.scope(record, Snapshot::Current);
            self.validate_target(&mut conn, &scope, None, position).await?;
            record.set(self.column.column(), position);
            return Ok(());
        }

        let (mut tx, mut working) = self.lock(record).await?;
        self.insert_at_in(&mut tx, &mut working, position).await?;
        tx.commit().await.sql_context("Failed to commit insert_at")?;
        *record = working;
        Ok(())
    }

    /// Swap `record` with the item below it.
    pub async fn move_lower(&self, record: &mut Record) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        self.move_adjacent(&mut tx, &mut working, Direction::Lower).await?;
        tx.commit().await.sql_context("Failed to commit move_lower")?;
        *record = working;
        Ok(())
    }

    /// Swap `record` with the item above it.
    pub async fn move_higher(&self, record: &mut Record) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        self.move_adjacent(&mut tx, &mut working, Direction::Higher).await?;
        tx.commit().await.sql_context("Failed to commit move_higher")?;
        *record = working;
        Ok(())
    }

    /// Move `record` to the end of its list.
    pub async fn move_to_bottom(&self, record: &mut Record) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        self.move_to_bottom_in(&mut tx, &mut working).await?;
        tx.commit().await.sql_context("Failed to commit move_to_bottom")?;
        *record = working;
        Ok(())
    }

    /// Move `record` to the start of its list.
    pub async fn move_to_top(&self, record: &mut Record) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        self.move_to_top_in(&mut tx, &mut working).await?;
        tx.commit().await.sql_context("Failed to commit move_to_top")?;
        *record = working;
        Ok(())
    }

    /// Take `record` out of its list and close the gap.
    pub async fn remove_from_list(&self, record: &mut Record) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        self.remove_from_list_in(&mut tx, &mut working).await?;
        tx.commit().await.sql_context("Failed to commit remove_from_list")?;
        *record = working;
        Ok(())
    }

    /// Add one to `record`'s position without touching other items.
    pub async fn increment_position(&self, record: &mut Record) -> Result<()> {
        self.step_position(record, 1).await
    }

    /// Subtract one from `record`'s position without touching other items.
    pub async fn decrement_position(&self, record: &mut Record) -> Result<()> {
        self.step_position(record, -1).await
    }

    /// Write `record`'s position as given, without touching other items.
    pub async fn set_list_position(&self, record: &mut Record, position: Option<i64>) -> Result<()> {
        if record.is_new() {
            record.set(self.column.column(), position);
            return Ok(());
        }
        let (mut tx, mut working) = self.lock(record).await?;
        self.set_own(&mut tx, &mut working, position).await?;
        tx.commit()
            .await
            .sql_context("Failed to commit set_list_position")?;
        *record = working;
        Ok(())
    }

    /// Shift the items between `old` and `new` to make room for `record`.
    ///
    /// With `old < new` the items in `(old, new]` move up one; with
    /// `old > new` the items in `[new, old)` move down one. `record` itself
    /// is never touched.
    pub async fn shuffle_intermediate(
        &self,
        conn: &mut AnyConnection,
        record: &Record,
        old: i64,
        new: i64,
    ) -> Result<()> {
        let scope = self.scope(record, Snapshot::Current);
        self.shuffle(conn, &scope, old, new, record.id()).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    fn scope(&self, record: &Record, snapshot: Snapshot) -> Filter {
        self.config().scope.filter_for(record, snapshot)
    }

    /// Position as last written, which direct operations work from.
    fn stored_position(&self, record: &Record) -> Result<Option<i64>> {
        record.was_int(self.column.column())
    }

    /// Begin a transaction, lock `record`'s row and reload its list columns
    /// into a working copy.
    ///
    /// Pending edits of the caller survive in the copy; direct operations
    /// act on the stored position and scope.
    async fn lock(&self, record: &Record) -> Result<(Transaction<'static, Any>, Record)> {
        let id = record.require_id()?;
        let mut tx = self.store.begin().await?;
        backend::lock_row(&mut tx, self.store.kind(), self.config(), id).await?;

        let stored = query::reload(&mut tx, &self.column, id).await?;
        let mut working = record.clone();
        working.refresh(self.column.column(), stored.position);
        for (key, value) in stored.scope {
            working.refresh(&key, value);
        }
        Ok((tx, working))
    }

    async fn validate_target(
        &self,
        conn: &mut AnyConnection,
        scope: &Filter,
        id: Option<i64>,
        position: i64,
    ) -> Result<()> {
        let top = self.column.top();
        let others = scope.clone().exclude(self.column.primary_key(), id);
        let max = top + query::count(conn, &self.column, &others).await?;
        if position < top || position > max {
            return Err(ListError::InvalidTargetPosition { position, top, max }.into());
        }
        Ok(())
    }

    async fn set_own(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
        position: Option<i64>,
    ) -> Result<()> {
        let id = record.require_id()?;
        mutator::set_position(conn, &self.column, id, position).await?;
        record.set_persisted(self.column.column(), position);
        Ok(())
    }

    /// Move `record` past the bottom of its list so shifted neighbours can
    /// take any position it held.
    async fn park(&self, conn: &mut AnyConnection, record: &mut Record, scope: &Filter) -> Result<()> {
        let bottom = query::bottom_position(conn, &self.column, scope, None).await?;
        self.set_own(conn, record, Some(bottom + TEMPORARY_POSITION_GAP))
            .await
    }

    async fn shuffle(
        &self,
        conn: &mut AnyConnection,
        scope: &Filter,
        old: i64,
        new: i64,
        exclude: Option<i64>,
    ) -> Result<()> {
        let column = self.column.column();
        let primary_key = self.column.primary_key();
        if old < new {
            let range = scope
                .clone()
                .gt(column, old)
                .le(column, new)
                .exclude(primary_key, exclude);
            mutator::decrement_all(conn, &self.column, &range).await?;
        } else if old > new {
            let range = scope
                .clone()
                .ge(column, new)
                .lt(column, old)
                .exclude(primary_key, exclude);
            mutator::increment_all(conn, &self.column, &range).await?;
        } else {
            return Ok(());
        }
        tracing::debug!(table = self.column.table(), old, new, "Shuffled intermediate items");
        Ok(())
    }

    async fn insert_at_in(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
        position: i64,
    ) -> Result<()> {
        let id = record.require_id()?;
        let scope = self.scope(record, Snapshot::Persisted);
        self.validate_target(conn, &scope, Some(id), position).await?;

        match self.stored_position(record)? {
            Some(old) if old == position => return Ok(()),
            Some(old) => {
                self.park(conn, record, &scope).await?;
                self.shuffle(conn, &scope, old, position, Some(id)).await?;
            }
            None => {
                let lower = scope
                    .clone()
                    .ge(self.column.column(), position)
                    .exclude(self.column.primary_key(), Some(id));
                mutator::increment_all(conn, &self.column, &lower).await?;
            }
        }
        self.set_own(conn, record, Some(position)).await?;
        tracing::debug!(table = self.column.table(), id, position, "Inserted at position");
        Ok(())
    }

    async fn move_adjacent(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
        direction: Direction,
    ) -> Result<()> {
        let Some(position) = self.stored_position(record)? else {
            return Ok(());
        };
        let id = record.require_id()?;
        let scope = self.scope(record, Snapshot::Persisted);
        let neighbour = match direction {
            Direction::Lower => {
                query::items_below(conn, &self.column, &scope, position, Some(id), Some(1)).await?
            }
            Direction::Higher => {
                query::items_above(conn, &self.column, &scope, position, Some(id), Some(1)).await?
            }
        };
        let Some(neighbour) = neighbour.into_iter().next() else {
            return Ok(());
        };

        if neighbour.position != position {
            if self.column.sequential() {
                self.park(conn, record, &scope).await?;
            }
            mutator::set_position(conn, &self.column, neighbour.id, Some(position)).await?;
            self.set_own(conn, record, Some(neighbour.position)).await?;
        } else {
            // Both share a position: step them apart.
            let step = match direction {
                Direction::Lower => 1,
                Direction::Higher => -1,
            };
            mutator::set_position(conn, &self.column, neighbour.id, Some(position - step))
                .await?;
            self.set_own(conn, record, Some(position + step)).await?;
        }
        tracing::debug!(
            table = self.column.table(),
            id,
            neighbour = neighbour.id,
            ?direction,
            "Moved past neighbour"
        );
        Ok(())
    }

    async fn move_to_bottom_in(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        let Some(position) = self.stored_position(record)? else {
            return Ok(());
        };
        let id = record.require_id()?;
        let scope = self.scope(record, Snapshot::Persisted);
        if self.column.sequential() {
            self.park(conn, record, &scope).await?;
        }

        let lower = scope
            .clone()
            .gt(self.column.column(), position)
            .exclude(self.column.primary_key(), Some(id));
        mutator::decrement_all(conn, &self.column, &lower).await?;

        let bottom = query::bottom_position(conn, &self.column, &scope, Some(id)).await? + 1;
        if self.stored_position(record)? != Some(bottom) {
            self.set_own(conn, record, Some(bottom)).await?;
        }
        Ok(())
    }

    async fn move_to_top_in(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        let Some(position) = self.stored_position(record)? else {
            return Ok(());
        };
        let id = record.require_id()?;
        let scope = self.scope(record, Snapshot::Persisted);
        if self.column.sequential() {
            self.park(conn, record, &scope).await?;
        }

        let higher = scope
            .clone()
            .lt(self.column.column(), position)
            .exclude(self.column.primary_key(), Some(id));
        mutator::increment_all(conn, &self.column, &higher).await?;

        let top = self.column.top();
        if self.stored_position(record)? != Some(top) {
            self.set_own(conn, record, Some(top)).await?;
        }
        Ok(())
    }

    async fn remove_from_list_in(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        let Some(position) = self.stored_position(record)? else {
            return Ok(());
        };
        let id = record.require_id()?;
        let lower = self
            .scope(record, Snapshot::Persisted)
            .gt(self.column.column(), position)
            .exclude(self.column.primary_key(), Some(id));

        // Row-by-row shifting would collide with our own row first.
        if self.column.sequential() {
            self.set_own(conn, record, None).await?;
            mutator::decrement_all(conn, &self.column, &lower).await?;
        } else {
            mutator::decrement_all(conn, &self.column, &lower).await?;
            self.set_own(conn, record, None).await?;
        }
        tracing::debug!(table = self.column.table(), id, position, "Removed from list");
        Ok(())
    }

    async fn step_position(&self, record: &mut Record, step: i64) -> Result<()> {
        let (mut tx, mut working) = self.lock(record).await?;
        if let Some(position) = self.stored_position(&working)? {
            self.set_own(&mut tx, &mut working, Some(position + step))
                .await?;
        }
        tx.commit().await.sql_context("Failed to commit position step")?;
        *record = working;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Higher,
    Lower,
}

async fn acquire(store: &ListStore) -> Result<PoolConnection<Any>> {
    store
        .pool()
        .acquire()
        .await
        .sql_context("Failed to acquire connection")
}
