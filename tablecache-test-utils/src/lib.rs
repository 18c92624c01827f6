//! tablecache Test Utilities
//!
//! Shared test infrastructure for the tablecache workspace:
//! - Proptest generators for keys, values and lifetimes
//! - A fault-injecting store wrapper that counts backend calls
//! - Fixtures for pools, entries and stores
//! - Assertions for tablecache-specific error shapes

// Re-export the types every test touches
pub use tablecache_core::{
    BackendError, Clock, ConfigError, ManualClock, PoolConfig, TableCacheError, TableCacheResult,
    ValidationError, RESERVED_CHARACTERS,
};
pub use tablecache_storage::{
    BatchGetOutput, CacheEntry, CacheItem, CachePool, EntryConverter, InMemoryTableStore,
    ItemKey, Row, TableStore,
};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use tablecache_core::BackendResult;

// ============================================================================
// TEST LOGGING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber for tests, once per process.
///
/// Honours `RUST_LOG`; defaults to `tablecache_storage=debug`. Output goes
/// through the test writer so it only shows for failing tests.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tablecache_storage=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// INSTRUMENTED STORE
// ============================================================================

/// Backend operations, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetItem,
    BatchGetItems,
    PutItem,
    DeleteItem,
    BatchDeleteItems,
}

#[derive(Debug, Default)]
struct Faults {
    failing_ops: HashMap<StoreOp, BackendError>,
    failing_puts: HashSet<String>,
    omitted: HashSet<String>,
    unprocessed: HashSet<String>,
}

/// Wraps a [`TableStore`], counting calls and injecting failures.
///
/// Faults are keyed on the primary-key value. Whole-operation failures are
/// returned before the inner store is touched; per-key batch faults are
/// applied to the inner store's response.
pub struct InstrumentedStore<S: TableStore> {
    inner: S,
    key_attribute: String,
    calls: Mutex<HashMap<StoreOp, usize>>,
    faults: Mutex<Faults>,
}

impl<S: TableStore> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            key_attribute: tablecache_core::DEFAULT_KEY_ATTRIBUTE.to_string(),
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Attribute used to find the key of a row in puts and batch reads.
    pub fn with_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.key_attribute = attribute.into();
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Calls made for one operation.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Calls made across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every call to `op` return `error`.
    pub fn fail_op(&self, op: StoreOp, error: BackendError) {
        self.faults.lock().unwrap().failing_ops.insert(op, error);
    }

    /// Make puts of the row keyed `key` fail with `RequestFailed`.
    pub fn fail_put_for(&self, key: impl Into<String>) {
        self.faults.lock().unwrap().failing_puts.insert(key.into());
    }

    /// Drop `key` from batch read responses without reporting it.
    pub fn omit_from_batch_get(&self, key: impl Into<String>) {
        self.faults.lock().unwrap().omitted.insert(key.into());
    }

    /// Report `key` as unprocessed in batch read responses.
    pub fn leave_unprocessed(&self, key: impl Into<String>) {
        self.faults.lock().unwrap().unprocessed.insert(key.into());
    }

    /// Remove every injected fault. Call counts are kept.
    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    fn record(&self, op: StoreOp) -> BackendResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.faults.lock().unwrap().failing_ops.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: TableStore> TableStore for InstrumentedStore<S> {
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>> {
        self.record(StoreOp::GetItem)?;
        self.inner.get_item(table, key).await
    }

    async fn batch_get_items(
        &self,
        table: &str,
        keys: &[ItemKey],
    ) -> BackendResult<BatchGetOutput> {
        self.record(StoreOp::BatchGetItems)?;
        let (omitted, unprocessed) = {
            let faults = self.faults.lock().unwrap();
            (faults.omitted.clone(), faults.unprocessed.clone())
        };

        let (held, forwarded): (Vec<ItemKey>, Vec<ItemKey>) = keys
            .iter()
            .cloned()
            .partition(|key| unprocessed.contains(&key.value));

        let mut output = self.inner.batch_get_items(table, &forwarded).await?;
        output.rows.retain(|row| {
            row.get_str(&self.key_attribute)
                .map_or(true, |key| !omitted.contains(key))
        });
        output.unprocessed_keys.extend(held);
        Ok(output)
    }

    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()> {
        self.record(StoreOp::PutItem)?;
        let rejected = row
            .get_str(&self.key_attribute)
            .map_or(false, |key| self.faults.lock().unwrap().failing_puts.contains(key));
        if rejected {
            return Err(BackendError::RequestFailed {
                table: table.to_string(),
                reason: "injected put failure".to_string(),
            });
        }
        self.inner.put_item(table, row).await
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<()> {
        self.record(StoreOp::DeleteItem)?;
        self.inner.delete_item(table, key).await
    }

    async fn batch_delete_items(&self, table: &str, keys: &[ItemKey]) -> BackendResult<()> {
        self.record(StoreOp::BatchDeleteItems)?;
        self.inner.batch_delete_items(table, keys).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tablecache inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;
    use std::time::Duration;

    /// A key the pool accepts.
    pub fn arb_valid_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9._-]{1,32}"
    }

    /// A key containing at least one reserved character.
    pub fn arb_reserved_key() -> impl Strategy<Value = String> {
        let reserved: Vec<char> = RESERVED_CHARACTERS.chars().collect();
        (
            "[a-z0-9]{0,8}",
            proptest::sample::select(reserved),
            "[a-z0-9]{0,8}",
        )
            .prop_map(|(head, c, tail)| format!("{}{}{}", head, c, tail))
    }

    /// Arbitrary JSON values, a few levels deep.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[ -~]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// A lifetime between one second and one day.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..=86_400).prop_map(Duration::from_secs)
    }

    /// A batch of distinct valid keys.
    pub fn arb_key_batch(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_valid_key(), 1..=max)
            .prop_map(|keys| keys.into_iter().collect())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built stores, pools and entries.

    use super::*;
    use serde_json::Value;

    /// Epoch seconds every fixture clock starts at.
    pub const T0: i64 = 1_700_000_000;

    pub const TABLE: &str = "cache";

    pub fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_epoch_seconds(T0))
    }

    /// In-memory store with the fixture table created.
    pub fn memory_store() -> InMemoryTableStore {
        let store = InMemoryTableStore::new();
        store.create_table(TABLE, tablecache_core::DEFAULT_KEY_ATTRIBUTE);
        store
    }

    /// Instrumented in-memory store with the fixture table created.
    pub fn instrumented_store() -> Arc<InstrumentedStore<InMemoryTableStore>> {
        Arc::new(InstrumentedStore::new(memory_store()))
    }

    /// Pool over `store` using the fixture table, bound to `clock`.
    pub fn pool<S: TableStore>(store: Arc<S>, clock: Arc<ManualClock>) -> CachePool<S> {
        match CachePool::new(store, PoolConfig::new(TABLE)) {
            Ok(pool) => pool.with_clock(clock),
            Err(e) => panic!("fixture pool config rejected: {:?}", e),
        }
    }

    /// Unsaved entry bound to the pool's clock with `value` set.
    pub fn entry<S: TableStore>(pool: &CachePool<S>, key: &str, value: Value) -> CacheEntry {
        let mut entry = pool.new_entry(key);
        entry.set(value);
        entry
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for tablecache results and entries.

    use super::*;
    use serde_json::Value;

    /// Assert that a result is an invalid-key validation error.
    #[track_caller]
    pub fn assert_invalid_key<T: std::fmt::Debug>(result: &TableCacheResult<T>) {
        match result {
            Err(e) if e.is_invalid_key() => {}
            other => panic!("Expected InvalidKey error, got: {:?}", other),
        }
    }

    /// Assert that a result is a backend error.
    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &TableCacheResult<T>) {
        match result {
            Err(TableCacheError::Backend(_)) => {}
            other => panic!("Expected Backend error, got: {:?}", other),
        }
    }

    /// Assert that a result is a config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &TableCacheResult<T>) {
        match result {
            Err(TableCacheError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that an entry is a hit holding `expected`.
    #[track_caller]
    pub fn assert_hit(entry: &CacheEntry, expected: &Value) {
        assert!(entry.is_hit(), "Expected hit for {}, got miss", entry.key());
        assert_eq!(entry.get(), Some(expected), "Value mismatch for {}", entry.key());
    }

    /// Assert that an entry is a miss.
    #[track_caller]
    pub fn assert_miss(entry: &CacheEntry) {
        assert!(!entry.is_hit(), "Expected miss for {}, got hit", entry.key());
    }

    /// Assert that entries carry exactly `keys`, in order.
    #[track_caller]
    pub fn assert_keys(entries: &[CacheEntry], keys: &[&str]) {
        let got: Vec<&str> = entries.iter().map(CacheEntry::key).collect();
        assert_eq!(got, keys, "Entry keys mismatch");
    }
}

// ============================================================================
// TESTS
// ============================================================================
