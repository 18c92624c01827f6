//! Cache item pool over a [`TableStore`].
//!
//! The pool validates keys, turns rows into [`CacheEntry`] values, reconciles
//! batch reads into one entry per requested key, and buffers deferred writes
//! until [`CachePool::commit`].
//!
//! # Error tiers
//!
//! - Caller errors (invalid key, unsupported item shape) are always returned
//!   as `Err`, before any backend call is made.
//! - Reads propagate backend failures, except a missing table, which reads as
//!   a miss.
//! - Writes and deletes fold backend failures into `false` so callers can
//!   treat them as retryable state.
//!
//! # Concurrency
//!
//! Every operation awaits its backend round trip before returning; nothing
//! runs in the background. `save_deferred` and `commit` take `&mut self`;
//! a pool shared between tasks needs an external lock around it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tablecache_core::{
    ttl, validate_key, validate_keys, BackendError, Clock, PoolConfig, SystemClock,
    TableCacheResult,
};

use super::codec::{JsonCodec, ValueCodec};
use super::converter::EntryConverter;
use super::entry::CacheEntry;
use super::traits::CacheItem;
use crate::backend::{ItemKey, Row, TableStore};

/// Cache item pool backed by a key-value table.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryTableStore::new());
/// store.create_table("cache", "id");
/// let mut pool = CachePool::new(store, PoolConfig::new("cache"))?;
///
/// let mut entry = pool.get_item("profile.42").await?;
/// if !entry.is_hit() {
///     entry.set(json!({"name": "a"})).expires_after(Some(Duration::from_secs(3600)));
///     pool.save(&entry).await?;
/// }
/// ```
pub struct CachePool<S: TableStore> {
    store: Arc<S>,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    converter: EntryConverter,
    codec: Arc<dyn ValueCodec>,
    /// Deferred writes keyed by insertion slot.
    deferred: BTreeMap<u64, CacheEntry>,
    next_slot: u64,
}

impl<S: TableStore> CachePool<S> {
    /// Create a pool with the system clock, default converter and JSON codec.
    pub fn new(store: Arc<S>, config: PoolConfig) -> TableCacheResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            converter: EntryConverter::new(),
            codec: Arc::new(JsonCodec),
            deferred: BTreeMap::new(),
            next_slot: 0,
        })
    }

    /// Use a different clock for expiration.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different adapter registry.
    pub fn with_converter(mut self, converter: EntryConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Use a different value codec.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// The validated configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Clock used for expiration and bound to every entry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The backing table store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of entries waiting for [`commit`](Self::commit).
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Keys waiting for commit, in insertion order.
    pub fn deferred_keys(&self) -> Vec<&str> {
        self.deferred.values().map(CacheEntry::key).collect()
    }

    /// A fresh, unsaved entry bound to this pool's clock.
    pub fn new_entry(&self, key: impl Into<String>) -> CacheEntry {
        CacheEntry::new(key, Arc::clone(&self.clock))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch one entry.
    pub async fn get_item(&self, key: &str) -> TableCacheResult<CacheEntry> {
        validate_key(key)?;
        let table = &self.config.table_name;

        tracing::debug!(table = %table, key, "get_item");
        match self.store.get_item(table, &self.item_key(key)).await {
            Ok(Some(row)) => self.entry_from_row(key, &row),
            Ok(None) => Ok(self.miss(key)),
            Err(BackendError::ResourceNotFound { table }) => {
                tracing::warn!(table = %table, key, "Cache table not found, reporting miss");
                Ok(self.miss(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch many entries with a single batch read.
    ///
    /// Returns exactly one entry per distinct requested key, in request
    /// order. Keys the backend left unprocessed or silently omitted come back
    /// as misses; they are not retried.
    pub async fn get_items<K: AsRef<str>>(&self, keys: &[K]) -> TableCacheResult<Vec<CacheEntry>> {
        validate_keys(keys)?;

        let mut seen = HashSet::with_capacity(keys.len());
        let requested: Vec<&str> = keys
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| seen.insert(*key))
            .collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let table = &self.config.table_name;
        let item_keys: Vec<ItemKey> = requested.iter().map(|key| self.item_key(key)).collect();

        tracing::debug!(table = %table, keys = item_keys.len(), "batch_get_items");
        let output = match self.store.batch_get_items(table, &item_keys).await {
            Ok(output) => output,
            Err(BackendError::ResourceNotFound { table }) => {
                tracing::warn!(
                    table = %table,
                    keys = requested.len(),
                    "Cache table not found, reporting misses"
                );
                return Ok(requested.iter().map(|key| self.miss(key)).collect());
            }
            Err(e) => return Err(e.into()),
        };

        let mut found: HashMap<String, CacheEntry> = HashMap::with_capacity(requested.len());
        for row in &output.rows {
            let key = row.get_str(&self.config.key_attribute).ok_or_else(|| {
                BackendError::MalformedRow {
                    table: table.clone(),
                    reason: format!("row is missing key attribute {}", self.config.key_attribute),
                }
            })?;
            if !seen.contains(key) {
                continue;
            }
            let entry = self.entry_from_row(key, row)?;
            found.insert(key.to_string(), entry);
        }

        for unprocessed in &output.unprocessed_keys {
            if !seen.contains(unprocessed.value.as_str()) {
                continue;
            }
            found
                .entry(unprocessed.value.clone())
                .or_insert_with(|| self.miss(&unprocessed.value));
        }

        if !output.unprocessed_keys.is_empty() {
            tracing::debug!(
                table = %table,
                unprocessed = output.unprocessed_keys.len(),
                "Batch read left keys unprocessed"
            );
        }

        // Anything the backend neither returned nor flagged is a miss.
        Ok(requested
            .iter()
            .map(|key| found.remove(*key).unwrap_or_else(|| self.miss(key)))
            .collect())
    }

    /// True iff `get_item(key)` would be a hit right now.
    pub async fn has_item(&self, key: &str) -> TableCacheResult<bool> {
        Ok(self.get_item(key).await?.is_hit())
    }

    // ========================================================================
    // DELETES
    // ========================================================================

    /// Bulk truncation is not supported; always returns false without
    /// touching the backend.
    pub fn clear(&self) -> bool {
        tracing::debug!(table = %self.config.table_name, "clear is not supported");
        false
    }

    /// Delete one key. Deleting a missing key succeeds.
    pub async fn delete_item(&self, key: &str) -> TableCacheResult<bool> {
        validate_key(key)?;
        let table = &self.config.table_name;

        tracing::debug!(table = %table, key, "delete_item");
        match self.store.delete_item(table, &self.item_key(key)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(table = %table, key, error = %e, "Cache delete failed");
                Ok(false)
            }
        }
    }

    /// Delete many keys with one batch call.
    ///
    /// The result is coarse: `false` means the batch call failed, without
    /// saying which keys were affected.
    pub async fn delete_items<K: AsRef<str>>(&self, keys: &[K]) -> TableCacheResult<bool> {
        validate_keys(keys)?;

        let mut seen = HashSet::with_capacity(keys.len());
        let item_keys: Vec<ItemKey> = keys
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| seen.insert(*key))
            .map(|key| self.item_key(key))
            .collect();
        if item_keys.is_empty() {
            return Ok(true);
        }

        let table = &self.config.table_name;
        tracing::debug!(table = %table, keys = item_keys.len(), "batch_delete_items");
        match self.store.batch_delete_items(table, &item_keys).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(
                    table = %table,
                    keys = item_keys.len(),
                    error = %e,
                    "Cache batch delete failed"
                );
                Ok(false)
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Write an item now. Unconditional overwrite.
    ///
    /// Returns `Ok(false)` if the backend rejects the write.
    pub async fn save(&self, item: &dyn CacheItem) -> TableCacheResult<bool> {
        let entry = self.converter.convert(item, &self.clock)?;
        validate_key(entry.key())?;
        Ok(self.persist(&entry).await)
    }

    /// Buffer an item for the next [`commit`](Self::commit). No backend call.
    pub fn save_deferred(&mut self, item: &dyn CacheItem) -> TableCacheResult<bool> {
        validate_key(item.key())?;
        let entry = self.converter.convert(item, &self.clock)?;
        validate_key(entry.key())?;

        let slot = self.next_slot;
        self.next_slot += 1;
        self.deferred.insert(slot, entry);
        Ok(true)
    }

    /// Write every buffered entry.
    ///
    /// Entries leave the buffer only when their own write succeeds, so a
    /// partial failure keeps the failed entries for the next commit. Returns
    /// true iff every write succeeded.
    pub async fn commit(&mut self) -> bool {
        let slots: Vec<u64> = self.deferred.keys().copied().collect();
        let mut all_saved = true;

        for slot in slots {
            let saved = match self.deferred.get(&slot) {
                Some(entry) => self.persist(entry).await,
                None => continue,
            };
            if saved {
                self.deferred.remove(&slot);
            } else {
                all_saved = false;
            }
        }

        if !all_saved {
            tracing::warn!(
                table = %self.config.table_name,
                pending = self.deferred.len(),
                "Commit left entries buffered"
            );
        }
        all_saved
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    fn item_key(&self, key: &str) -> ItemKey {
        ItemKey::new(self.config.key_attribute.as_str(), key)
    }

    fn miss(&self, key: &str) -> CacheEntry {
        CacheEntry::miss(key, Arc::clone(&self.clock))
    }

    fn entry_from_row(&self, key: &str, row: &Row) -> TableCacheResult<CacheEntry> {
        let table = &self.config.table_name;
        let raw = row.get_str(&self.config.value_attribute).ok_or_else(|| {
            BackendError::MalformedRow {
                table: table.clone(),
                reason: format!(
                    "row for {} is missing string attribute {}",
                    key, self.config.value_attribute
                ),
            }
        })?;
        let value = self.codec.decode(key, raw)?;

        let expires_at = match row.get(&self.config.ttl_attribute) {
            None => None,
            Some(attr) => {
                let secs = attr.as_number().ok_or_else(|| BackendError::MalformedRow {
                    table: table.clone(),
                    reason: format!(
                        "attribute {} for {} is not an integer",
                        self.config.ttl_attribute, key
                    ),
                })?;
                Some(ttl::from_epoch_seconds(secs).ok_or_else(|| {
                    BackendError::MalformedRow {
                        table: table.clone(),
                        reason: format!("ttl {} for {} is out of range", secs, key),
                    }
                })?)
            }
        };

        Ok(CacheEntry::stored(key, value, expires_at, Arc::clone(&self.clock)))
    }

    fn row_from_entry(&self, entry: &CacheEntry) -> TableCacheResult<Row> {
        let raw = match entry.get() {
            Some(value) => self.codec.encode(value)?,
            None => self.codec.encode(&serde_json::Value::Null)?,
        };

        let mut row = Row::new()
            .with(self.config.key_attribute.as_str(), entry.key())
            .with(self.config.value_attribute.as_str(), raw);

        let expires_at = entry.expiration().or_else(|| {
            self.config
                .default_ttl
                .and_then(|lifetime| ttl::expires_after(self.clock.now(), lifetime))
        });
        if let Some(at) = expires_at {
            row.insert(self.config.ttl_attribute.as_str(), ttl::to_epoch_seconds(at));
        }
        Ok(row)
    }

    /// Write one entry, folding every failure into `false`.
    async fn persist(&self, entry: &CacheEntry) -> bool {
        let table = &self.config.table_name;
        let row = match self.row_from_entry(entry) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(
                    table = %table,
                    key = entry.key(),
                    error = %e,
                    "Cache value encode failed"
                );
                return false;
            }
        };

        tracing::debug!(table = %table, key = entry.key(), "put_item");
        match self.store.put_item(table, row).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(table = %table, key = entry.key(), error = %e, "Cache save failed");
                false
            }
        }
    }
}

impl<S: TableStore> fmt::Debug for CachePool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePool")
            .field("config", &self.config)
            .field("converter", &self.converter)
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl<S: TableStore> Drop for CachePool<S> {
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            tracing::warn!(
                table = %self.config.table_name,
                pending = self.deferred.len(),
                "Cache pool dropped with uncommitted deferred entries"
            );
        }
    }
}
