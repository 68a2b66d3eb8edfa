use std::sync::Arc;

use listrank::{ListConfig, ListHooks, ListStore, PositionList, Record, Scope, Value};
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Row};

// ==========================
// STORE FACTORIES
// ==========================

/// Creates a test store based on TEST_BACKEND env var.
///
/// Supported values:
/// - "sqlite" or unset: SQLite in-memory store (default)
/// - "postgres": PostgreSQL store in an isolated schema (requires TEST_POSTGRES_URL)
///
/// # Example
/// ```bash
/// # Run tests with SQLite
/// cargo test
///
/// # Run tests with PostgreSQL
/// TEST_BACKEND=postgres TEST_POSTGRES_URL="postgres://localhost/listrank_test" cargo test
/// ```
pub async fn test_store() -> ListStore {
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("postgres") => {
            let url = std::env::var("TEST_POSTGRES_URL")
                .unwrap_or_else(|_| "postgres://localhost/listrank_test".to_string());
            ListStore::connect_postgres_isolated(&url)
                .await
                .expect("Failed to connect to PostgreSQL")
        }
        _ => ListStore::sqlite_in_memory()
            .await
            .expect("Failed to create SQLite store"),
    }
}

/// Test store with an empty `items` table.
///
/// `items` carries two position columns: `position` scoped by `list_id`
/// and `rank`, used by the multi-column tests.
pub async fn items_store() -> ListStore {
    let store = test_store().await;
    store
        .execute(
            "CREATE TABLE items (
                id BIGINT PRIMARY KEY,
                list_id BIGINT,
                kind TEXT,
                position BIGINT,
                rank BIGINT
            )",
        )
        .await
        .expect("Failed to create items table");
    store
}

/// Add a unique index covering exactly the position column.
pub async fn add_unique_position_index(store: &ListStore) {
    store
        .execute("CREATE UNIQUE INDEX items_position_unique ON items (position)")
        .await
        .expect("Failed to create unique index");
}

/// Config of the `position` column, scoped by `list_id`.
pub fn items_config() -> ListConfig {
    ListConfig::new("items").scope(Scope::column("list_id"))
}

/// Set up a list over `items` with the given config.
pub async fn setup_list(store: &ListStore, config: ListConfig) -> PositionList {
    PositionList::setup(store, config)
        .await
        .expect("Failed to set up list")
}

/// The default list: `position` scoped by `list_id`.
pub async fn items_list(store: &ListStore) -> PositionList {
    setup_list(store, items_config()).await
}

/// Hooks running the callbacks of a single list.
pub fn hooks_for(list: &PositionList) -> ListHooks {
    ListHooks::new().with(Arc::new(list.clone()))
}

// ==========================
// ROW HELPERS
// ==========================

/// Bind a [`Value`] to a raw test query.
pub fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Int(i) => query.bind(*i),
        Value::Text(s) => query.bind(s.as_str()),
    }
}

/// Insert rows at positions `1..=count` of `list_id` without any hooks.
///
/// Ids are `list_id * 100 + position`.
pub async fn seed(store: &ListStore, list_id: i64, count: i64) -> Vec<Record> {
    let mut records = Vec::new();
    for position in 1..=count {
        let id = list_id * 100 + position;
        sqlx::query("INSERT INTO items (id, list_id, position) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(list_id)
            .bind(position)
            .execute(store.pool())
            .await
            .expect("Failed to seed item");
        records.push(load(store, id).await);
    }
    records
}

/// Read a stored row back as a persisted record.
pub async fn load(store: &ListStore, id: i64) -> Record {
    let row = sqlx::query("SELECT list_id, kind, position, rank FROM items WHERE id = $1")
        .bind(id)
        .fetch_one(store.pool())
        .await
        .expect("Failed to load item");
    let list_id: Option<i64> = row.get(0);
    let kind: Option<String> = row.get(1);
    let position: Option<i64> = row.get(2);
    let rank: Option<i64> = row.get(3);
    Record::persisted(
        id,
        [
            ("list_id", Value::from(list_id)),
            ("kind", kind.map_or(Value::Null, Value::Text)),
            ("position", Value::from(position)),
            ("rank", Value::from(rank)),
        ],
    )
}

/// `(id, position)` of every listed row of `list_id`, in list order.
pub async fn positions(store: &ListStore, list_id: i64) -> Vec<(i64, i64)> {
    column_positions(store, "position", Some(list_id)).await
}

/// `(id, value)` of every row with a non-null `column`, in column order.
pub async fn column_positions(
    store: &ListStore,
    column: &str,
    list_id: Option<i64>,
) -> Vec<(i64, i64)> {
    let rows = match list_id {
        Some(list_id) => {
            let sql = format!(
                "SELECT id, {column} FROM items WHERE list_id = $1 AND {column} IS NOT NULL \
                 ORDER BY {column}, id"
            );
            sqlx::query(&sql)
                .bind(list_id)
                .fetch_all(store.pool())
                .await
        }
        None => {
            let sql = format!(
                "SELECT id, {column} FROM items WHERE {column} IS NOT NULL ORDER BY {column}, id"
            );
            sqlx::query(&sql).fetch_all(store.pool()).await
        }
    }
    .expect("Failed to read positions");
    rows.iter().map(|row| (row.get(0), row.get(1))).collect()
}

/// Ids of `list_id` in list order.
pub async fn order(store: &ListStore, list_id: i64) -> Vec<i64> {
    positions(store, list_id)
        .await
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}

/// Assert the listed rows of `list_id` hold exactly `top..top + n`.
pub async fn assert_contiguous(store: &ListStore, list_id: i64, top: i64) {
    let positions: Vec<i64> = positions(store, list_id)
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    let expected: Vec<i64> = (top..top + positions.len() as i64).collect();
    assert_eq!(
        positions, expected,
        "list {list_id} is not contiguous from {top}"
    );
}

// ==========================
// LIFECYCLE HELPERS
// ==========================
// These play the role of an application's persistence layer: one
// transaction per write with the list hooks around the statement.

async fn next_id(conn: &mut AnyConnection) -> i64 {
    let row = sqlx::query("SELECT COALESCE(MAX(id), 0) + 1 FROM items")
        .fetch_one(&mut *conn)
        .await
        .expect("Failed to compute next id");
    row.get(0)
}

async fn write_insert(conn: &mut AnyConnection, record: &Record) -> listrank::Result<()> {
    let attributes: Vec<(&str, &Value)> = record.attributes().collect();
    let columns: Vec<&str> = attributes.iter().map(|(column, _)| *column).collect();
    let placeholders: Vec<String> = (2..attributes.len() + 2).map(|i| format!("${i}")).collect();
    let sql = if columns.is_empty() {
        "INSERT INTO items (id) VALUES ($1)".to_string()
    } else {
        format!(
            "INSERT INTO items (id, {}) VALUES ($1, {})",
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    let id = record.require_id()?;
    let mut query = sqlx::query(&sql).bind(id);
    for (_, value) in &attributes {
        query = bind_value(query, value);
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

async fn write_update(conn: &mut AnyConnection, record: &Record) -> listrank::Result<()> {
    let changed = record.changed_columns();
    if changed.is_empty() {
        return Ok(());
    }
    let assignments: Vec<String> = changed
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE items SET {} WHERE id = ${}",
        assignments.join(", "),
        changed.len() + 1
    );
    let mut query = sqlx::query(&sql);
    for column in &changed {
        query = bind_value(query, record.get(column));
    }
    query
        .bind(record.require_id()?)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert `record` with the list hooks, assigning the next free id.
pub async fn create(store: &ListStore, hooks: &ListHooks, record: &mut Record) -> listrank::Result<()> {
    let mut tx = store.begin().await?;
    hooks.before_validation(record)?;
    hooks.before_create(&mut tx, record).await?;
    let id = next_id(&mut tx).await;
    record.set_id(id);
    write_insert(&mut tx, record).await?;
    tx.commit().await?;
    record.mark_persisted();
    Ok(())
}

/// Save the pending changes of `record` with the list hooks.
pub async fn update(store: &ListStore, hooks: &ListHooks, record: &mut Record) -> listrank::Result<()> {
    let mut tx = store.begin().await?;
    hooks.before_validation(record)?;
    let ticket = hooks.before_update(&mut tx, record).await?;
    write_update(&mut tx, record).await?;
    hooks.after_update(&mut tx, record, ticket).await?;
    tx.commit().await?;
    record.mark_persisted();
    Ok(())
}

/// Delete `record` with the list hooks.
pub async fn destroy(store: &ListStore, hooks: &ListHooks, record: &mut Record) -> listrank::Result<()> {
    let mut tx = store.begin().await?;
    hooks.before_destroy(&mut tx, record).await?;
    sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(record.require_id()?)
        .execute(&mut *tx)
        .await?;
    hooks.after_destroy(&mut tx, record).await?;
    tx.commit().await?;
    Ok(())
}
