//! Random operation sequences must keep every list gap-free.

use listrank::{ListStore, PositionList, Record, SequentialUpdates, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::helpers::*;

const LISTS: [i64; 3] = [1, 2, 3];

async fn all_ids(store: &ListStore) -> Vec<i64> {
    use sqlx::Row;
    let rows = sqlx::query("SELECT id FROM items ORDER BY id")
        .fetch_all(store.pool())
        .await
        .unwrap();
    rows.iter().map(|row| row.get(0)).collect()
}

async fn assert_all_contiguous(store: &ListStore, step: usize, op: &str) {
    for list_id in LISTS {
        let positions: Vec<i64> = positions(store, list_id)
            .await
            .into_iter()
            .map(|(_, position)| position)
            .collect();
        let expected: Vec<i64> = (1..=positions.len() as i64).collect();
        assert_eq!(
            positions, expected,
            "list {list_id} broken after step {step} ({op})"
        );
    }
}

/// Run `steps` random operations, checking every list after each one.
///
/// Explicit position updates write a position another row still holds
/// until `after_update` resolves it, so they are skipped when a unique
/// index covers the position.
async fn run_random_operations(
    store: &ListStore,
    list: &PositionList,
    seed_value: u64,
    steps: usize,
    explicit_updates: bool,
) {
    let hooks = hooks_for(list);
    let mut rng = StdRng::seed_from_u64(seed_value);
    for list_id in LISTS {
        seed(store, list_id, 4).await;
    }

    for step in 0..steps {
        let ids = all_ids(store).await;
        let id = ids[rng.gen_range(0..ids.len())];
        let mut record = load(store, id).await;
        let mut op = rng.gen_range(0..10);
        if (op == 7 && !explicit_updates) || (op == 8 && ids.len() <= 2) {
            op = 9;
        }

        let name = match op {
            0 => {
                let bottom = list.bottom_position(&record).await.unwrap();
                let max = if list.in_list(&record).unwrap() {
                    bottom
                } else {
                    bottom + 1
                };
                let target = rng.gen_range(1..=max.max(1));
                list.insert_at(&mut record, target).await.unwrap();
                "insert_at"
            }
            1 => {
                list.move_higher(&mut record).await.unwrap();
                "move_higher"
            }
            2 => {
                list.move_lower(&mut record).await.unwrap();
                "move_lower"
            }
            3 => {
                list.move_to_top(&mut record).await.unwrap();
                "move_to_top"
            }
            4 => {
                list.move_to_bottom(&mut record).await.unwrap();
                "move_to_bottom"
            }
            5 => {
                list.remove_from_list(&mut record).await.unwrap();
                "remove_from_list"
            }
            6 => {
                let list_id = LISTS[rng.gen_range(0..LISTS.len())];
                record.set("list_id", list_id);
                update(store, &hooks, &mut record).await.unwrap();
                "change_scope"
            }
            7 => {
                if list.in_list(&record).unwrap() {
                    let bottom = list.bottom_position(&record).await.unwrap();
                    record.set("position", rng.gen_range(1..=bottom));
                    update(store, &hooks, &mut record).await.unwrap();
                }
                "set_position"
            }
            8 => {
                destroy(store, &hooks, &mut record).await.unwrap();
                "destroy"
            }
            _ => {
                let list_id = LISTS[rng.gen_range(0..LISTS.len())];
                let mut record = Record::new().with("list_id", Value::Int(list_id));
                create(store, &hooks, &mut record).await.unwrap();
                "create"
            }
        };
        assert_all_contiguous(store, step, name).await;
    }
}

#[tokio::test]
async fn test_random_operations_bulk() {
    let store = items_store().await;
    let list = items_list(&store).await;
    run_random_operations(&store, &list, 7, 120, true).await;
}

#[tokio::test]
async fn test_random_operations_sequential() {
    let store = items_store().await;
    let list = setup_list(
        &store,
        items_config().sequential_updates(SequentialUpdates::Always),
    )
    .await;
    run_random_operations(&store, &list, 11, 120, true).await;
}

#[tokio::test]
async fn test_random_operations_unique_index() {
    let store = items_store().await;
    store
        .execute("CREATE UNIQUE INDEX items_list_position ON items (list_id, position)")
        .await
        .unwrap();
    let list = setup_list(
        &store,
        items_config().sequential_updates(SequentialUpdates::Always),
    )
    .await;
    run_random_operations(&store, &list, 23, 120, false).await;
}
