//! tablecache Storage - Table Backends and the Cache Item Pool
//!
//! [`backend`] defines the [`TableStore`] contract and ships an in-memory and
//! an LMDB implementation. [`cache`] builds the item pool on top of it.

pub mod backend;
pub mod cache;

pub use backend::{
    AttributeValue, BatchGetOutput, InMemoryTableStore, ItemKey, LmdbStoreError, LmdbTableStore,
    Row, TableStore,
};
pub use cache::{
    CacheEntry, CacheItem, CachePool, DefaultEntryAdapter, EntryAdapter, EntryConverter,
    ItemKind, JsonCodec, ValueCodec,
};

pub use tablecache_core::{
    Clock, ManualClock, PoolConfig, SystemClock, TableCacheError, TableCacheResult,
};
