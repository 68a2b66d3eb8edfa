//! Lifecycle hooks for every ordered column of a table.
//!
//! An entity may carry several independently ordered columns, each with its
//! own [`PositionList`]. [`ListHooks`] runs the lifecycle callbacks of all of
//! them, in registration order, around one write:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! hooks.before_validation(&mut item)?;
//! let ticket = hooks.before_update(&mut tx, &mut item).await?;
//! write_item(&mut tx, &item).await?;
//! hooks.after_update(&mut tx, &item, ticket).await?;
//! tx.commit().await?;
//! item.mark_persisted();
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::AnyConnection;

use crate::Result;
use crate::list::{PositionList, ScopeTransition};
use crate::record::Record;

/// Lifecycle callbacks of one ordered column.
///
/// See [`crate::list::callbacks`] for when each one runs.
#[async_trait]
pub trait ListCallbacks: Send + Sync {
    /// Position column these callbacks maintain.
    fn column_name(&self) -> &str;

    /// Normalise the pending position before the write is validated.
    fn before_validation(&self, record: &mut Record) -> Result<()>;

    /// Place a record that is about to be inserted.
    async fn before_create(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()>;

    /// Move a record whose scope is about to change.
    async fn before_update(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
    ) -> Result<ScopeTransition>;

    /// Resolve a position collision after an update.
    async fn after_update(
        &self,
        conn: &mut AnyConnection,
        record: &Record,
        transition: ScopeTransition,
    ) -> Result<()>;

    /// Lock and reload a record about to be deleted.
    async fn before_destroy(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()>;

    /// Close the gap left by a deleted record.
    async fn after_destroy(&self, conn: &mut AnyConnection, record: &Record) -> Result<()>;
}

#[async_trait]
impl ListCallbacks for PositionList {
    fn column_name(&self) -> &str {
        self.config().column.as_str()
    }

    fn before_validation(&self, record: &mut Record) -> Result<()> {
        self.check_top_position(record)
    }

    async fn before_create(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        PositionList::before_create(self, conn, record).await
    }

    async fn before_update(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
    ) -> Result<ScopeTransition> {
        PositionList::before_update(self, conn, record).await
    }

    async fn after_update(
        &self,
        conn: &mut AnyConnection,
        record: &Record,
        transition: ScopeTransition,
    ) -> Result<()> {
        PositionList::after_update(self, conn, record, transition).await
    }

    async fn before_destroy(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        PositionList::before_destroy(self, conn, record).await
    }

    async fn after_destroy(&self, conn: &mut AnyConnection, record: &Record) -> Result<()> {
        PositionList::after_destroy(self, conn, record).await
    }
}

/// Scope transitions from [`ListHooks::before_update`], one per list.
///
/// Pass it unchanged to [`ListHooks::after_update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTicket {
    transitions: Vec<ScopeTransition>,
}

impl UpdateTicket {
    /// Transitions in registration order.
    pub fn transitions(&self) -> &[ScopeTransition] {
        &self.transitions
    }

    /// Check if any list moved the record to a new scope.
    pub fn any_moved(&self) -> bool {
        self.transitions.contains(&ScopeTransition::Moved)
    }
}

/// The lifecycle callbacks of every ordered column of a table.
///
/// Callbacks run in the order the lists were added. The first error stops
/// the sequence; the caller's transaction should then be rolled back.
#[derive(Clone, Default)]
pub struct ListHooks {
    lists: Vec<Arc<dyn ListCallbacks>>,
    suspended: bool,
}

impl std::fmt::Debug for ListHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<&str> = self.lists.iter().map(|list| list.column_name()).collect();
        f.debug_struct("ListHooks")
            .field("columns", &columns)
            .field("suspended", &self.suspended)
            .finish()
    }
}

impl ListHooks {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            lists: Vec::new(),
            suspended: false,
        }
    }

    /// Add the callbacks of one column.
    pub fn add(&mut self, list: Arc<dyn ListCallbacks>) {
        self.lists.push(list);
    }

    /// Add the callbacks of one column, builder style.
    pub fn with(mut self, list: Arc<dyn ListCallbacks>) -> Self {
        self.add(list);
        self
    }

    /// Get the number of registered lists.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Check if no list is registered.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// A copy of these hooks that does nothing.
    ///
    /// For bulk imports that write final positions themselves.
    pub fn suspended(&self) -> Self {
        Self {
            lists: self.lists.clone(),
            suspended: true,
        }
    }

    /// Check if this collection skips every callback.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn active(&self) -> &[Arc<dyn ListCallbacks>] {
        if self.suspended { &[] } else { &self.lists }
    }

    /// Run `before_validation` of every list.
    pub fn before_validation(&self, record: &mut Record) -> Result<()> {
        for list in self.active() {
            list.before_validation(record)?;
        }
        Ok(())
    }

    /// Run `before_create` of every list.
    pub async fn before_create(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        for list in self.active() {
            list.before_create(conn, record).await?;
        }
        Ok(())
    }

    /// Run `before_update` of every list.
    pub async fn before_update(
        &self,
        conn: &mut AnyConnection,
        record: &mut Record,
    ) -> Result<UpdateTicket> {
        let mut transitions = Vec::with_capacity(self.lists.len());
        for list in self.active() {
            transitions.push(list.before_update(conn, record).await?);
        }
        Ok(UpdateTicket { transitions })
    }

    /// Run `after_update` of every list with its own transition.
    pub async fn after_update(
        &self,
        conn: &mut AnyConnection,
        record: &Record,
        ticket: UpdateTicket,
    ) -> Result<()> {
        for (i, list) in self.active().iter().enumerate() {
            let transition = ticket.transitions.get(i).copied().unwrap_or_default();
            list.after_update(conn, record, transition).await?;
        }
        Ok(())
    }

    /// Run `before_destroy` of every list.
    pub async fn before_destroy(&self, conn: &mut AnyConnection, record: &mut Record) -> Result<()> {
        for list in self.active() {
            list.before_destroy(conn, record).await?;
        }
        Ok(())
    }

    /// Run `after_destroy` of every list.
    pub async fn after_destroy(&self, conn: &mut AnyConnection, record: &Record) -> Result<()> {
        for list in self.active() {
            list.after_destroy(conn, record).await?;
        }
        Ok(())
    }
}
