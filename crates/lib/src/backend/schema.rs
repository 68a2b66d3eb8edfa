//! Schema introspection for list tables.
//!
//! The engine never creates or migrates list tables. It only asks the store
//! three questions about them, answered per dialect:
//!
//! - does the table exist,
//! - is there a unique index covering exactly the position column,
//! - what is the declared default of the position column.

use sqlx::{AnyConnection, Row};

use crate::Result;

use super::{DbKind, SqlxResultExt};

/// Check if `table` exists in the current schema.
pub async fn table_exists(conn: &mut AnyConnection, kind: DbKind, table: &str) -> Result<bool> {
    let sql = match kind {
        DbKind::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        DbKind::Postgres => {
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = current_schema() AND table_name = $1"
        }
    };
    let row = sqlx::query(sql)
        .bind(table)
        .fetch_one(&mut *conn)
        .await
        .sql_context("Failed to check table existence")?;
    let count: i64 = row.try_get(0).sql_context("Failed to read table count")?;
    Ok(count > 0)
}

/// Check if a unique index covers exactly `column` of `table`.
///
/// Composite unique indexes (for example over scope and position) do not
/// count.
pub async fn has_unique_index(
    conn: &mut AnyConnection,
    kind: DbKind,
    table: &str,
    column: &str,
) -> Result<bool> {
    match kind {
        DbKind::Sqlite => {
            let rows = sqlx::query(r#"SELECT name FROM pragma_index_list($1) WHERE "unique" = 1"#)
                .bind(table)
                .fetch_all(&mut *conn)
                .await
                .sql_context("Failed to list indexes")?;
            let mut index_names = Vec::with_capacity(rows.len());
            for row in rows {
                let name: String = row.try_get(0).sql_context("Failed to read index name")?;
                index_names.push(name);
            }

            for index in index_names {
                let rows = sqlx::query("SELECT name FROM pragma_index_info($1)")
                    .bind(index.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .sql_context("Failed to read index columns")?;
                let mut columns = Vec::with_capacity(rows.len());
                for row in rows {
                    let name: Option<String> =
                        row.try_get(0).sql_context("Failed to read index column")?;
                    columns.push(name);
                }
                if columns.len() == 1 && columns[0].as_deref() == Some(column) {
                    tracing::debug!(table, column, index = %index, "Found unique position index");
                    return Ok(true);
                }
            }
            Ok(false)
        }
        DbKind::Postgres => {
            let row = sqlx::query(
                "SELECT COUNT(*) FROM pg_index i
                 JOIN pg_class t ON t.oid = i.indrelid
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = i.indkey[0]
                 WHERE t.relname = $1
                   AND pg_table_is_visible(t.oid)
                   AND i.indisunique
                   AND i.indnkeyatts = 1
                   AND a.attname = $2",
            )
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await
            .sql_context("Failed to inspect unique indexes")?;
            let count: i64 = row.try_get(0).sql_context("Failed to read index count")?;
            Ok(count > 0)
        }
    }
}

/// Declared integer default of `column`, if any.
///
/// Non-integer defaults (expressions, sequences) are reported as `None`.
pub async fn column_default(
    conn: &mut AnyConnection,
    kind: DbKind,
    table: &str,
    column: &str,
) -> Result<Option<i64>> {
    let raw: Option<String> = match kind {
        DbKind::Sqlite => {
            let row = sqlx::query("SELECT dflt_value FROM pragma_table_info($1) WHERE name = $2")
                .bind(table)
                .bind(column)
                .fetch_optional(&mut *conn)
                .await
                .sql_context("Failed to read column default")?;
            match row {
                Some(row) => row.try_get(0).sql_context("Failed to decode column default")?,
                None => None,
            }
        }
        DbKind::Postgres => {
            let row = sqlx::query(
                "SELECT column_default::text FROM information_schema.columns
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2",
            )
            .bind(table)
            .bind(column)
            .fetch_optional(&mut *conn)
            .await
            .sql_context("Failed to read column default")?;
            match row {
                Some(row) => row.try_get(0).sql_context("Failed to decode column default")?,
                None => None,
            }
        }
    };
    Ok(raw.as_deref().and_then(parse_integer_default))
}

/// Parse a declared column default such as `0`, `'0'`, `(-1)` or
/// `'1'::integer`.
pub fn parse_integer_default(raw: &str) -> Option<i64> {
    let mut value = raw.trim();
    if let Some((expr, _cast)) = value.split_once("::") {
        value = expr.trim();
    }
    while let Some(inner) = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
    {
        value = inner.trim();
    }
    value.parse().ok()
}
