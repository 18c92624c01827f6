//! Cache entries.
//!
//! A [`CacheEntry`] is one cache slot as seen by callers. It is created fresh
//! on every read and never shared between calls.
//!
//! # Hit status
//!
//! The hit flag is not stored. Every call to [`CacheEntry::is_hit`] asks the
//! entry's clock for the current instant and compares it with the
//! expiration, so an entry read just before its expiration reports a miss
//! once the clock passes it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tablecache_core::{ttl, Clock};

use super::traits::{CacheItem, ItemKind};

/// One cache slot: key, value, optional expiration.
#[derive(Clone)]
pub struct CacheEntry {
    key: String,
    value: Option<Value>,
    /// Whether the backend returned a row for this key.
    stored: bool,
    expires_at: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl CacheEntry {
    /// A fresh, unsaved entry. Reports a miss until saved and read back.
    pub fn new(key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(key, None, false, None, clock)
    }

    /// Assemble an entry from its parts.
    ///
    /// `stored` says whether a backend row backs this entry; it is the only
    /// way an entry can ever report a hit.
    pub fn from_parts(
        key: impl Into<String>,
        value: Option<Value>,
        stored: bool,
        expires_at: Option<DateTime<Utc>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            stored,
            expires_at,
            clock,
        }
    }

    /// Entry for a key the backend has no row for.
    pub(crate) fn miss(key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::new(key, clock)
    }

    /// Entry backed by a stored row.
    pub(crate) fn stored(
        key: impl Into<String>,
        value: Value,
        expires_at: Option<DateTime<Utc>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_parts(key, Some(value), true, expires_at, clock)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True iff a row backs this entry and it has not expired as of now.
    pub fn is_hit(&self) -> bool {
        ttl::is_live(self.stored, self.expires_at, self.clock.now())
    }

    /// The value, regardless of hit status. Check [`is_hit`](Self::is_hit)
    /// first; a miss carries no meaningful value.
    pub fn get(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consume the entry and return its value.
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Replace the value. Local until passed to a save operation.
    pub fn set(&mut self, value: impl Into<Value>) -> &mut Self {
        self.value = Some(value.into());
        self
    }

    /// Set an absolute expiration; `None` means never expire.
    pub fn expires_at(&mut self, expiration: Option<DateTime<Utc>>) -> &mut Self {
        self.expires_at = expiration;
        self
    }

    /// Expire `duration` after the clock's current instant; `None` means
    /// never expire.
    pub fn expires_after(&mut self, duration: Option<Duration>) -> &mut Self {
        let now = self.clock.now();
        self.expires_at = duration.and_then(|d| ttl::expires_after(now, d));
        self
    }

    /// The clock this entry evaluates expiration against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("stored", &self.stored)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl CacheItem for CacheEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn value(&self) -> Option<Value> {
        self.value.clone()
    }

    fn is_hit(&self) -> bool {
        CacheEntry::is_hit(self)
    }

    fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    fn kind(&self) -> ItemKind {
        ItemKind::Native
    }

    fn as_entry(&self) -> Option<&CacheEntry> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablecache_core::ManualClock;

    const T0: i64 = 1_700_000_000;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_epoch_seconds(T0))
    }

    #[test]
    fn test_new_entry_is_a_miss_even_with_value() {
        let mut entry = CacheEntry::new("k", clock());
        entry.set(json!(1));
        assert!(!entry.is_hit());
        assert_eq!(entry.get(), Some(&json!(1)));
    }

    #[test]
    fn test_stored_entry_without_expiration_is_hit() {
        let entry = CacheEntry::stored("k", json!("v"), None, clock());
        assert!(entry.is_hit());
        assert_eq!(entry.key(), "k");
        assert_eq!(entry.expiration(), None);
    }

    #[test]
    fn test_hit_status_is_recomputed_on_each_query() {
        let clock = clock();
        let entry = CacheEntry::stored("k", json!("v"), Some(at(T0 + 5)), clock.clone());
        assert!(entry.is_hit());

        clock.advance(Duration::from_secs(4));
        assert!(entry.is_hit());

        clock.advance(Duration::from_secs(1));
        assert!(!entry.is_hit(), "expiration instant itself is a miss");
    }

    #[test]
    fn test_expires_after_uses_entry_clock() {
        let mut entry = CacheEntry::new("k", clock());
        entry.set(json!(true)).expires_after(Some(Duration::from_secs(60)));
        assert_eq!(entry.expiration(), Some(at(T0 + 60)));

        entry.expires_after(None);
        assert_eq!(entry.expiration(), None);
    }

    #[test]
    fn test_expires_at_chains() {
        let mut entry = CacheEntry::new("k", clock());
        entry.expires_at(Some(at(T0 + 1))).set("x");
        assert_eq!(entry.expiration(), Some(at(T0 + 1)));
        assert_eq!(entry.into_value(), Some(json!("x")));
    }

    #[test]
    fn test_cache_item_view_is_native() {
        let entry = CacheEntry::stored("k", json!(3), None, clock());
        let item: &dyn CacheItem = &entry;
        assert_eq!(item.kind(), ItemKind::Native);
        assert!(item.as_entry().is_some());
        assert_eq!(item.value(), Some(json!(3)));
        assert!(item.is_hit());
    }

    #[test]
    fn test_debug_omits_clock() {
        let entry = CacheEntry::new("k", clock());
        let debug = format!("{:?}", entry);
        assert!(debug.contains("CacheEntry"));
        assert!(debug.contains("\"k\""));
    }
}
