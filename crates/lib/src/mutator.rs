//! Position writes.
//!
//! Range shifts come in two strategies, picked per column at setup:
//!
//! - **bulk**: one `UPDATE ... SET position = position + delta` over the range;
//! - **sequential**: the matching rows are read and updated one at a time.
//!   Rows are visited from the end nearest the free slot (ascending for a
//!   negative delta, descending for a positive one) so no single write lands
//!   on a position another unprocessed row still holds. A unique index on
//!   the position column requires this.
//!
//! A unique violation is returned as `StoreError::ConstraintViolation` and
//! never retried; the caller's transaction is expected to roll back.

use sqlx::{AnyConnection, Row};

use crate::Result;
use crate::backend::SqlxResultExt;
use crate::config::ResolvedColumn;
use crate::sql::{Filter, Statement};

/// Add `delta` to the position of every row matching `filter`.
///
/// Returns the number of rows moved.
pub async fn shift_range_by(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
    delta: i64,
) -> Result<u64> {
    if delta == 0 {
        return Ok(0);
    }
    let filter = filter.clone().not_null(column.column());
    if column.sequential() {
        shift_sequentially(conn, column, &filter, delta).await
    } else {
        shift_in_bulk(conn, column, &filter, delta).await
    }
}

/// Move every matching row one position down the list.
pub async fn increment_all(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
) -> Result<u64> {
    shift_range_by(conn, column, filter, 1).await
}

/// Move every matching row one position up the list.
pub async fn decrement_all(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
) -> Result<u64> {
    shift_range_by(conn, column, filter, -1).await
}

async fn shift_in_bulk(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
    delta: i64,
) -> Result<u64> {
    let mut stmt = Statement::new("UPDATE ");
    stmt.push_ident(column.table())
        .push(" SET ")
        .push_ident(column.column())
        .push(" = ")
        .push_ident(column.column())
        .push(" + ")
        .push_bind(delta);
    stmt.push_where(filter);

    let moved = stmt
        .query()
        .execute(&mut *conn)
        .await
        .sql_context("Failed to shift positions")?
        .rows_affected();
    tracing::debug!(table = column.table(), delta, moved, "Shifted positions in bulk");
    Ok(moved)
}

async fn shift_sequentially(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
    delta: i64,
) -> Result<u64> {
    // Increments start from the highest position, decrements from the
    // lowest, so every row steps into a slot that is already free.
    let direction = if delta > 0 { " DESC" } else { " ASC" };
    let mut select = Statement::new("SELECT ");
    select
        .push_ident(column.primary_key())
        .push(" FROM ")
        .push_ident(column.table());
    select.push_where(filter);
    select
        .push(" ORDER BY ")
        .push_ident(column.column())
        .push(direction)
        .push(", ")
        .push_ident(column.primary_key())
        .push(direction);

    let rows = select
        .query()
        .fetch_all(&mut *conn)
        .await
        .sql_context("Failed to select rows to shift")?;
    let mut ids = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.try_get(0).sql_context("Failed to decode primary key")?;
        ids.push(id);
    }

    for id in &ids {
        let mut update = Statement::new("UPDATE ");
        update
            .push_ident(column.table())
            .push(" SET ")
            .push_ident(column.column())
            .push(" = ")
            .push_ident(column.column())
            .push(" + ")
            .push_bind(delta)
            .push(" WHERE ")
            .push_ident(column.primary_key())
            .push(" = ")
            .push_bind(*id);
        update
            .query()
            .execute(&mut *conn)
            .await
            .sql_context("Failed to shift position")?;
        tracing::trace!(table = column.table(), id, delta, "Shifted row");
    }

    tracing::debug!(
        table = column.table(),
        delta,
        moved = ids.len(),
        "Shifted positions sequentially"
    );
    Ok(ids.len() as u64)
}

/// Write one row's position, `None` clearing it.
pub async fn set_position(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    id: i64,
    position: Option<i64>,
) -> Result<()> {
    let mut stmt = Statement::new("UPDATE ");
    stmt.push_ident(column.table())
        .push(" SET ")
        .push_ident(column.column())
        .push(" = ")
        .push_bind(position)
        .push(" WHERE ")
        .push_ident(column.primary_key())
        .push(" = ")
        .push_bind(id);
    stmt.query()
        .execute(&mut *conn)
        .await
        .sql_context("Failed to set position")?;
    tracing::trace!(table = column.table(), id, ?position, "Set position");
    Ok(())
}
