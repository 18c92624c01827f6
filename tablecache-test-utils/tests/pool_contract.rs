//! End-to-end pool behaviour against an instrumented in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde_json::json;
use tablecache_test_utils::assertions::{
    assert_backend_error, assert_hit, assert_invalid_key, assert_keys, assert_miss,
};
use tablecache_test_utils::fixtures::{self, T0, TABLE};
use tablecache_test_utils::{
    init_test_tracing, BackendError, CachePool, InMemoryTableStore, InstrumentedStore,
    PoolConfig, StoreOp,
};

type Store = InstrumentedStore<InMemoryTableStore>;

fn setup() -> (
    Arc<Store>,
    Arc<tablecache_test_utils::ManualClock>,
    CachePool<Store>,
) {
    init_test_tracing();
    let store = fixtures::instrumented_store();
    let clock = fixtures::clock();
    let pool = fixtures::pool(Arc::clone(&store), clock.clone());
    (store, clock, pool)
}

#[tokio::test]
async fn profile_scenario_expires_after_ttl() {
    let (store, clock, pool) = setup();
    let value = json!({"name": "a"});

    let mut entry = fixtures::entry(&pool, "user.42", value.clone());
    entry.expires_after(Some(Duration::from_secs(3600)));
    assert!(pool.save(&entry).await.unwrap());

    let row = store.inner().row(TABLE, "user.42").unwrap();
    assert_eq!(row.get_number("ttl"), Some(T0 + 3600));

    clock.advance(Duration::from_secs(10));
    assert_hit(&pool.get_item("user.42").await.unwrap(), &value);

    clock.advance(Duration::from_secs(3591));
    assert_miss(&pool.get_item("user.42").await.unwrap());
}

#[tokio::test]
async fn colon_key_is_rejected_before_backend() {
    let (store, _clock, pool) = setup();
    assert_invalid_key(&pool.get_item("user:42").await);
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn reserved_keys_make_no_backend_calls() {
    let (store, _clock, mut pool) = setup();

    for c in tablecache_test_utils::RESERVED_CHARACTERS.chars() {
        let key = format!("a{}b", c);
        let entry = fixtures::entry(&pool, &key, json!(1));

        assert_invalid_key(&pool.get_item(&key).await);
        assert_invalid_key(&pool.has_item(&key).await);
        assert_invalid_key(&pool.get_items(&["fine", key.as_str()]).await);
        assert_invalid_key(&pool.delete_item(&key).await);
        assert_invalid_key(&pool.delete_items(&[key.as_str()]).await);
        assert_invalid_key(&pool.save(&entry).await);
        assert_invalid_key(&pool.save_deferred(&entry));
    }

    assert_eq!(store.total_calls(), 0);
    assert_eq!(pool.deferred_len(), 0);
}

#[tokio::test]
async fn hit_strictly_before_expiration() {
    let (_store, clock, pool) = setup();
    let mut entry = fixtures::entry(&pool, "k", json!("v"));
    entry.expires_at(DateTime::from_timestamp(T0 + 100, 0));
    pool.save(&entry).await.unwrap();

    clock.advance(Duration::from_secs(99));
    let read = pool.get_item("k").await.unwrap();
    assert!(read.is_hit());

    // Same entry, recomputed after the clock moves.
    clock.advance(Duration::from_secs(1));
    assert!(!read.is_hit());
    assert!(!pool.has_item("k").await.unwrap());
}

#[tokio::test]
async fn get_items_one_entry_per_distinct_key() {
    let (store, _clock, pool) = setup();
    for k in ["a", "b", "c", "d"] {
        pool.save(&fixtures::entry(&pool, k, json!(k))).await.unwrap();
    }
    store.omit_from_batch_get("b");
    store.leave_unprocessed("c");

    let entries = pool
        .get_items(&["d", "a", "b", "c", "a", "x"])
        .await
        .unwrap();

    assert_keys(&entries, &["d", "a", "b", "c", "x"]);
    assert_hit(&entries[0], &json!("d"));
    assert_hit(&entries[1], &json!("a"));
    assert_miss(&entries[2]);
    assert_miss(&entries[3]);
    assert_miss(&entries[4]);
    assert_eq!(store.calls(StoreOp::BatchGetItems), 1);
}

#[tokio::test]
async fn get_items_empty_makes_no_call() {
    let (store, _clock, pool) = setup();
    let keys: Vec<String> = Vec::new();
    assert!(pool.get_items(&keys).await.unwrap().is_empty());
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn get_items_throttled_propagates() {
    let (store, _clock, pool) = setup();
    store.fail_op(
        StoreOp::BatchGetItems,
        BackendError::Throttled {
            table: TABLE.to_string(),
        },
    );
    assert_backend_error(&pool.get_items(&["a", "b"]).await);
}

#[tokio::test]
async fn get_item_failure_propagates_but_missing_table_is_miss() {
    let (store, _clock, pool) = setup();
    store.fail_op(
        StoreOp::GetItem,
        BackendError::RequestFailed {
            table: TABLE.to_string(),
            reason: "connection reset".to_string(),
        },
    );
    assert_backend_error(&pool.get_item("k").await);

    store.fail_op(
        StoreOp::GetItem,
        BackendError::ResourceNotFound {
            table: TABLE.to_string(),
        },
    );
    assert_miss(&pool.get_item("k").await.unwrap());
}

#[tokio::test]
async fn delete_nonexistent_key_succeeds() {
    let (store, _clock, pool) = setup();
    assert!(pool.delete_item("never-saved").await.unwrap());
    assert_eq!(store.calls(StoreOp::DeleteItem), 1);
}

#[tokio::test]
async fn delete_failures_become_false() {
    let (store, _clock, pool) = setup();
    let failure = BackendError::RequestFailed {
        table: TABLE.to_string(),
        reason: "boom".to_string(),
    };
    store.fail_op(StoreOp::DeleteItem, failure.clone());
    store.fail_op(StoreOp::BatchDeleteItems, failure);

    assert!(!pool.delete_item("k").await.unwrap());
    assert!(!pool.delete_items(&["k", "j"]).await.unwrap());
}

#[tokio::test]
async fn delete_items_empty_makes_no_call() {
    let (store, _clock, pool) = setup();
    let keys: [&str; 0] = [];
    assert!(pool.delete_items(&keys).await.unwrap());
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn clear_is_unsupported() {
    let (store, _clock, pool) = setup();
    assert!(!pool.clear());
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn save_failure_becomes_false() {
    let (store, _clock, pool) = setup();
    store.fail_op(
        StoreOp::PutItem,
        BackendError::Throttled {
            table: TABLE.to_string(),
        },
    );
    assert!(!pool.save(&fixtures::entry(&pool, "k", json!(1))).await.unwrap());
}

#[tokio::test]
async fn commit_keeps_only_failed_entries() {
    let (store, _clock, mut pool) = setup();
    for k in ["a", "b", "c", "d", "e"] {
        let entry = fixtures::entry(&pool, k, json!(k));
        assert!(pool.save_deferred(&entry).unwrap());
    }
    assert_eq!(store.total_calls(), 0);

    store.fail_put_for("b");
    store.fail_put_for("d");

    assert!(!pool.commit().await);
    assert_eq!(pool.deferred_keys(), vec!["b", "d"]);
    assert_eq!(store.inner().row_count(TABLE), 3);

    store.heal();
    assert!(pool.commit().await);
    assert_eq!(pool.deferred_len(), 0);
    assert_eq!(store.inner().row_count(TABLE), 5);
}

#[tokio::test]
async fn custom_attribute_names_flow_through_instrumented_store() {
    init_test_tracing();
    let inner = InMemoryTableStore::new();
    inner.create_table("sessions", "sid");
    let store = Arc::new(InstrumentedStore::new(inner).with_key_attribute("sid"));
    let config = PoolConfig::new("sessions")
        .with_key_attribute("sid")
        .with_value_attribute("blob");
    let pool = CachePool::new(Arc::clone(&store), config)
        .unwrap()
        .with_clock(fixtures::clock());

    pool.save(&fixtures::entry(&pool, "s1", json!(1))).await.unwrap();
    pool.save(&fixtures::entry(&pool, "s2", json!(2))).await.unwrap();
    store.omit_from_batch_get("s2");

    let entries = pool.get_items(&["s1", "s2"]).await.unwrap();
    assert_hit(&entries[0], &json!(1));
    assert_miss(&entries[1]);
}
