use listrank::{AddNewAt, ListError, Record, Value};

use crate::helpers::*;

fn new_item(list_id: i64) -> Record {
    Record::new().with("list_id", list_id)
}

#[tokio::test]
async fn test_create_appends_at_bottom() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let mut record = new_item(1);
        create(&store, &hooks, &mut record).await.unwrap();
        ids.push(record.id().unwrap());
    }

    let expected: Vec<(i64, i64)> = ids.iter().copied().zip(1..).collect();
    assert_eq!(positions(&store, 1).await, expected);
}

#[tokio::test]
async fn test_create_at_top() {
    let store = items_store().await;
    let list = setup_list(&store, items_config().add_new_at(AddNewAt::Top)).await;
    let hooks = hooks_for(&list);
    seed(&store, 1, 2).await;

    let mut record = new_item(1);
    create(&store, &hooks, &mut record).await.unwrap();

    let id = record.id().unwrap();
    assert_eq!(positions(&store, 1).await, vec![(id, 1), (101, 2), (102, 3)]);
}

#[tokio::test]
async fn test_create_with_placement_disabled() {
    let store = items_store().await;
    let list = setup_list(&store, items_config().add_new_at(AddNewAt::Disabled)).await;
    let hooks = hooks_for(&list);
    seed(&store, 1, 2).await;

    let mut record = new_item(1);
    create(&store, &hooks, &mut record).await.unwrap();

    assert!(list.not_in_list(&record).unwrap());
    assert_eq!(order(&store, 1).await, vec![101, 102]);
}

#[tokio::test]
async fn test_create_at_explicit_position() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    seed(&store, 1, 3).await;

    let mut record = new_item(1).with("position", 2);
    create(&store, &hooks, &mut record).await.unwrap();

    let id = record.id().unwrap();
    assert_eq!(order(&store, 1).await, vec![101, id, 102, 103]);
    assert_contiguous(&store, 1, 1).await;
}

#[tokio::test]
async fn test_create_clamps_below_top() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    seed(&store, 1, 2).await;

    let mut record = new_item(1).with("position", -3);
    create(&store, &hooks, &mut record).await.unwrap();

    let id = record.id().unwrap();
    assert_eq!(order(&store, 1).await, vec![id, 101, 102]);
    assert_contiguous(&store, 1, 1).await;
}

#[tokio::test]
async fn test_column_default_means_unpositioned() {
    let store = test_store().await;
    store
        .execute(
            "CREATE TABLE items (
                id BIGINT PRIMARY KEY,
                list_id BIGINT,
                kind TEXT,
                position BIGINT DEFAULT 0,
                rank BIGINT
            )",
        )
        .await
        .unwrap();
    let list = items_list(&store).await;
    assert_eq!(list.column().default_position(), Some(0));
    let hooks = hooks_for(&list);
    seed(&store, 1, 2).await;

    // An application that fills in column defaults hands over position 0.
    let mut record = new_item(1).with("position", 0);
    assert!(list.is_default_position(&record).unwrap());
    create(&store, &hooks, &mut record).await.unwrap();

    let id = record.id().unwrap();
    assert_eq!(positions(&store, 1).await, vec![(101, 1), (102, 2), (id, 3)]);
}

#[tokio::test]
async fn test_explicit_position_update_shuffles() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut items = seed(&store, 1, 5).await;

    items[4].set("position", 2);
    update(&store, &hooks, &mut items[4]).await.unwrap();
    assert_eq!(order(&store, 1).await, vec![101, 105, 102, 103, 104]);

    let mut moved = load(&store, 102).await;
    moved.set("position", 5);
    update(&store, &hooks, &mut moved).await.unwrap();
    assert_eq!(order(&store, 1).await, vec![101, 105, 103, 104, 102]);
    assert_contiguous(&store, 1, 1).await;
}

#[tokio::test]
async fn test_update_without_position_change_is_quiet() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut items = seed(&store, 1, 3).await;

    items[1].set("kind", "note");
    update(&store, &hooks, &mut items[1]).await.unwrap();

    assert_eq!(order(&store, 1).await, vec![101, 102, 103]);
    assert_eq!(load(&store, 102).await.get("kind"), &Value::Text("note".into()));
}

#[tokio::test]
async fn test_relisting_unpositioned_via_update() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut items = seed(&store, 1, 3).await;
    list.remove_from_list(&mut items[0]).await.unwrap();
    assert_eq!(order(&store, 1).await, vec![102, 103]);

    items[0].set("position", 1);
    update(&store, &hooks, &mut items[0]).await.unwrap();

    assert_eq!(order(&store, 1).await, vec![101, 102, 103]);
    assert_contiguous(&store, 1, 1).await;
}

#[tokio::test]
async fn test_scope_change_moves_to_bottom_of_new_list() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut first = seed(&store, 1, 3).await;
    seed(&store, 2, 2).await;

    first[0].set("list_id", 2);
    update(&store, &hooks, &mut first[0]).await.unwrap();

    assert_eq!(positions(&store, 1).await, vec![(102, 1), (103, 2)]);
    assert_eq!(
        positions(&store, 2).await,
        vec![(201, 1), (202, 2), (101, 3)]
    );
    assert!(!first[0].changed("list_id"));
}

#[tokio::test]
async fn test_scope_change_with_explicit_position() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut first = seed(&store, 1, 3).await;
    seed(&store, 2, 3).await;

    first[2].set("list_id", 2);
    first[2].set("position", 1);
    update(&store, &hooks, &mut first[2]).await.unwrap();

    assert_eq!(order(&store, 1).await, vec![101, 102]);
    assert_eq!(order(&store, 2).await, vec![103, 201, 202, 203]);
    assert_contiguous(&store, 2, 1).await;
}

#[tokio::test]
async fn test_scope_change_with_placement_disabled() {
    let store = items_store().await;
    let list = setup_list(&store, items_config().add_new_at(AddNewAt::Disabled)).await;
    let hooks = hooks_for(&list);
    let mut first = seed(&store, 1, 3).await;
    seed(&store, 2, 2).await;

    first[0].set("list_id", 2);
    update(&store, &hooks, &mut first[0]).await.unwrap();

    assert_eq!(order(&store, 1).await, vec![102, 103]);
    assert_eq!(order(&store, 2).await, vec![201, 202]);
    assert!(list.not_in_list(&load(&store, 101).await).unwrap());
}

#[tokio::test]
async fn test_stale_scope_is_rejected() {
    let store = items_store().await;
    let list = items_list(&store).await;
    let hooks = hooks_for(&list);
    let mut first = seed(&store, 1, 3).await;
    seed(&store, 2, 1).await;

    // Someone else moves the row to list 3 behind our back.
    sqlx::query("UPDATE items SET list_id = 3 WHERE id = 101")
        .execute(store.pool())
        .await
        .unwrap();

    first[0].set("list_id", 2);
    let err = update(&store, &hooks, &mut first[0]).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        listrank::Error::List(ListError::StaleScope { id: 101, .. })
    ));

    // Nothing was written.
    assert_eq!(order(&store, 1).await, vec![102, 103]);
    assert_eq!(order(&store, 2).await, vec![201]);
    assert_eq!(order(&store, 3).await, vec![101]);
}
