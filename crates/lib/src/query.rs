//! Boundary and range reads over a scope.
//!
//! Every function here restricts its scope filter to rows with a non-null
//! position, and runs on the connection it is given so reads made during a
//! list operation see that operation's own uncommitted writes.

use serde::{Deserialize, Serialize};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

use crate::Result;
use crate::backend::{SqlxResultExt, StoreError};
use crate::config::ResolvedColumn;
use crate::record::Value;
use crate::sql::{Filter, Statement};

/// Primary key and position of a listed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionedRow {
    /// Primary key
    pub id: i64,
    /// Position within its scope
    pub position: i64,
}

/// Which end of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Lowest position.
    Top,
    /// Highest position.
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Ascending,
    Descending,
}

/// Position and scope columns of a stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Position column value
    pub position: Option<i64>,
    /// Values of the scope key columns, in scope order
    pub scope: Vec<(String, Value)>,
}

fn listed(column: &ResolvedColumn, scope: &Filter) -> Filter {
    scope.clone().not_null(column.column())
}

fn select_rows(
    column: &ResolvedColumn,
    filter: &Filter,
    order: Order,
    limit: Option<usize>,
) -> Statement {
    let direction = match order {
        Order::Ascending => " ASC",
        Order::Descending => " DESC",
    };
    let mut stmt = Statement::new("SELECT ");
    stmt.push_ident(column.primary_key())
        .push(", ")
        .push_ident(column.column())
        .push(" FROM ")
        .push_ident(column.table());
    stmt.push_where(filter);
    stmt.push(" ORDER BY ")
        .push_ident(column.column())
        .push(direction)
        .push(", ")
        .push_ident(column.primary_key())
        .push(direction);
    if let Some(limit) = limit {
        stmt.push(" LIMIT ").push_bind(limit as i64);
    }
    stmt
}

fn positioned_row(row: &AnyRow) -> Result<PositionedRow> {
    Ok(PositionedRow {
        id: row.try_get(0).sql_context("Failed to decode primary key")?,
        position: row.try_get(1).sql_context("Failed to decode position")?,
    })
}

async fn fetch_rows(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
    order: Order,
    limit: Option<usize>,
) -> Result<Vec<PositionedRow>> {
    let stmt = select_rows(column, filter, order, limit);
    let rows = stmt
        .query()
        .fetch_all(&mut *conn)
        .await
        .sql_context("Failed to fetch list rows")?;
    rows.iter().map(positioned_row).collect()
}

/// Extreme row of a scope, optionally ignoring one primary key.
pub async fn boundary(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
    boundary: Boundary,
    exclude: Option<i64>,
) -> Result<Option<PositionedRow>> {
    let filter = listed(column, scope).exclude(column.primary_key(), exclude);
    let order = match boundary {
        Boundary::Top => Order::Ascending,
        Boundary::Bottom => Order::Descending,
    };
    let rows = fetch_rows(conn, column, &filter, order, Some(1)).await?;
    Ok(rows.into_iter().next())
}

/// Highest position in a scope, or `top - 1` when the scope is empty.
pub async fn bottom_position(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
    exclude: Option<i64>,
) -> Result<i64> {
    let bottom = boundary(conn, column, scope, Boundary::Bottom, exclude).await?;
    Ok(bottom.map_or(column.top() - 1, |row| row.position))
}

/// Rows at or above `position`, nearest first, excluding `id`.
pub async fn items_above(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
    position: i64,
    id: Option<i64>,
    limit: Option<usize>,
) -> Result<Vec<PositionedRow>> {
    let filter = listed(column, scope)
        .le(column.column(), position)
        .exclude(column.primary_key(), id);
    fetch_rows(conn, column, &filter, Order::Descending, limit).await
}

/// Rows at or below `position`, nearest first, excluding `id`.
pub async fn items_below(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
    position: i64,
    id: Option<i64>,
    limit: Option<usize>,
) -> Result<Vec<PositionedRow>> {
    let filter = listed(column, scope)
        .ge(column.column(), position)
        .exclude(column.primary_key(), id);
    fetch_rows(conn, column, &filter, Order::Ascending, limit).await
}

/// Number of rows with a position in `[low, high]`, excluding `id`.
pub async fn range_count(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
    low: i64,
    high: i64,
    exclude: Option<i64>,
) -> Result<i64> {
    let filter = listed(column, scope)
        .ge(column.column(), low)
        .le(column.column(), high)
        .exclude(column.primary_key(), exclude);
    count_matching(conn, column, &filter).await
}

/// Number of positioned rows in a scope.
pub async fn count(conn: &mut AnyConnection, column: &ResolvedColumn, scope: &Filter) -> Result<i64> {
    count_matching(conn, column, &listed(column, scope)).await
}

async fn count_matching(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    filter: &Filter,
) -> Result<i64> {
    let mut stmt = Statement::new("SELECT COUNT(*) FROM ");
    stmt.push_ident(column.table());
    stmt.push_where(filter);
    let row = stmt
        .query()
        .fetch_one(&mut *conn)
        .await
        .sql_context("Failed to count list rows")?;
    row.try_get(0).sql_context("Failed to decode count")
}

/// Every positioned row of a scope in list order.
pub async fn positions(
    conn: &mut AnyConnection,
    column: &ResolvedColumn,
    scope: &Filter,
) -> Result<Vec<PositionedRow>> {
    fetch_rows(conn, column, &listed(column, scope), Order::Ascending, None).await
}

/// Read a row's position and scope key columns.
pub async fn reload(conn: &mut AnyConnection, column: &ResolvedColumn, id: i64) -> Result<StoredRow> {
    let keys = column.config().scope.key_columns();
    let mut stmt = Statement::new("SELECT ");
    stmt.push_ident(column.column());
    for key in keys {
        stmt.push(", ").push_ident(key);
    }
    stmt.push(" FROM ")
        .push_ident(column.table())
        .push(" WHERE ")
        .push_ident(column.primary_key())
        .push(" = ")
        .push_bind(id);

    let row = stmt
        .query()
        .fetch_optional(&mut *conn)
        .await
        .sql_context("Failed to reload row")?
        .ok_or_else(|| StoreError::RecordNotFound {
            table: column.table().to_string(),
            id,
        })?;

    let position: Option<i64> = row.try_get(0).sql_context("Failed to decode position")?;
    let mut scope = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        scope.push((key.clone(), decode_value(&row, i + 1)?));
    }
    Ok(StoredRow { position, scope })
}

/// Decode a column of unknown type into a [`Value`].
fn decode_value(row: &AnyRow, index: usize) -> Result<Value> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.into());
    }
    let value: Option<String> = row
        .try_get(index)
        .sql_context("Failed to decode scope column")?;
    Ok(value.map_or(Value::Null, Value::Text))
}
