//! Adapter registry turning arbitrary cache items into [`CacheEntry`] values.
//!
//! The pool only persists native entries. Callers may hand it any
//! [`CacheItem`]; the [`EntryConverter`] walks its adapters in order and the
//! first one whose [`EntryAdapter::supports`] accepts the item performs the
//! conversion. Dispatch is on the item's [`ItemKind`] tag.

use std::fmt;
use std::sync::Arc;

use tablecache_core::{Clock, TableCacheResult, ValidationError};

use super::entry::CacheEntry;
use super::traits::{CacheItem, ItemKind};

/// Converts one family of cache item shapes into native entries.
pub trait EntryAdapter: Send + Sync {
    /// Name used in logs and debug output.
    fn name(&self) -> &str;

    fn supports(&self, item: &dyn CacheItem) -> bool;

    fn convert(&self, item: &dyn CacheItem, clock: &Arc<dyn Clock>)
        -> TableCacheResult<CacheEntry>;
}

/// Built-in adapter for native entries and generic items.
///
/// Native entries are cloned as-is. Generic items are rebuilt from their
/// accessors and bound to the pool's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEntryAdapter;

impl EntryAdapter for DefaultEntryAdapter {
    fn name(&self) -> &str {
        "default"
    }

    fn supports(&self, item: &dyn CacheItem) -> bool {
        matches!(item.kind(), ItemKind::Native | ItemKind::Generic)
    }

    fn convert(
        &self,
        item: &dyn CacheItem,
        clock: &Arc<dyn Clock>,
    ) -> TableCacheResult<CacheEntry> {
        match item.kind() {
            ItemKind::Native => item.as_entry().cloned().ok_or_else(|| {
                ValidationError::UnsupportedEntryType {
                    kind: "Native without entry".to_string(),
                }
                .into()
            }),
            ItemKind::Generic => Ok(CacheEntry::from_parts(
                item.key(),
                item.value(),
                item.is_hit(),
                item.expiration(),
                Arc::clone(clock),
            )),
            other => Err(ValidationError::UnsupportedEntryType {
                kind: format!("{:?}", other),
            }
            .into()),
        }
    }
}

/// Ordered adapter registry.
#[derive(Clone)]
pub struct EntryConverter {
    adapters: Vec<Arc<dyn EntryAdapter>>,
    /// Number of adapters registered ahead of the built-in default.
    registered: usize,
}

impl EntryConverter {
    /// Registry holding only [`DefaultEntryAdapter`].
    pub fn new() -> Self {
        Self {
            adapters: vec![Arc::new(DefaultEntryAdapter)],
            registered: 0,
        }
    }

    /// Registry with no adapters at all; every conversion fails until
    /// adapters are registered.
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
            registered: 0,
        }
    }

    /// Add an adapter. Registered adapters are consulted in registration
    /// order, before the built-in default.
    pub fn register(&mut self, adapter: Arc<dyn EntryAdapter>) -> &mut Self {
        self.adapters.insert(self.registered, adapter);
        self.registered += 1;
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_adapter(mut self, adapter: Arc<dyn EntryAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapter names in consultation order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Convert `item` with the first adapter that supports it.
    pub fn convert(
        &self,
        item: &dyn CacheItem,
        clock: &Arc<dyn Clock>,
    ) -> TableCacheResult<CacheEntry> {
        match self.adapters.iter().find(|a| a.supports(item)) {
            Some(adapter) => adapter.convert(item, clock),
            None => Err(ValidationError::UnsupportedEntryType {
                kind: format!("{:?}", item.kind()),
            }
            .into()),
        }
    }
}

impl Default for EntryConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntryConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryConverter")
            .field("adapters", &self.adapter_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};
    use tablecache_core::{ManualClock, TableCacheError};

    struct PlainItem {
        key: String,
        value: Value,
        expires_at: Option<DateTime<Utc>>,
    }

    impl CacheItem for PlainItem {
        fn key(&self) -> &str {
            &self.key
        }
        fn value(&self) -> Option<Value> {
            Some(self.value.clone())
        }
        fn is_hit(&self) -> bool {
            true
        }
        fn expiration(&self) -> Option<DateTime<Utc>> {
            self.expires_at
        }
    }

    struct SessionItem {
        id: String,
        user: String,
    }

    impl CacheItem for SessionItem {
        fn key(&self) -> &str {
            &self.id
        }
        fn value(&self) -> Option<Value> {
            Some(Value::String(self.user.clone()))
        }
        fn is_hit(&self) -> bool {
            false
        }
        fn expiration(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn kind(&self) -> ItemKind {
            ItemKind::Custom("session")
        }
    }

    struct SessionAdapter;

    impl EntryAdapter for SessionAdapter {
        fn name(&self) -> &str {
            "session"
        }
        fn supports(&self, item: &dyn CacheItem) -> bool {
            item.kind() == ItemKind::Custom("session")
        }
        fn convert(
            &self,
            item: &dyn CacheItem,
            clock: &Arc<dyn Clock>,
        ) -> TableCacheResult<CacheEntry> {
            let mut entry = CacheEntry::new(format!("session.{}", item.key()), Arc::clone(clock));
            entry.set(json!({ "user": item.value() }));
            Ok(entry)
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::at_epoch_seconds(1_000))
    }

    #[test]
    fn test_native_entry_is_identity() {
        let clock = clock();
        let mut entry = CacheEntry::new("k", Arc::clone(&clock));
        entry.set(json!([1, 2]));

        let converted = EntryConverter::new().convert(&entry, &clock).unwrap();
        assert_eq!(converted.key(), "k");
        assert_eq!(converted.get(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_generic_item_is_copied_through_accessors() {
        let clock = clock();
        let expires_at = DateTime::from_timestamp(2_000, 0);
        let item = PlainItem {
            key: "plain".to_string(),
            value: json!({"a": 1}),
            expires_at,
        };

        let entry = EntryConverter::new().convert(&item, &clock).unwrap();
        assert_eq!(entry.key(), "plain");
        assert_eq!(entry.get(), Some(&json!({"a": 1})));
        assert_eq!(entry.expiration(), expires_at);
        assert!(entry.is_hit());
    }

    #[test]
    fn test_custom_kind_without_adapter_is_unsupported() {
        let item = SessionItem {
            id: "s1".to_string(),
            user: "ann".to_string(),
        };
        let err = EntryConverter::new().convert(&item, &clock()).unwrap_err();
        assert!(matches!(
            err,
            TableCacheError::Validation(ValidationError::UnsupportedEntryType { .. })
        ));
    }

    #[test]
    fn test_registered_adapter_handles_custom_kind() {
        let converter = EntryConverter::new().with_adapter(Arc::new(SessionAdapter));
        let item = SessionItem {
            id: "s1".to_string(),
            user: "ann".to_string(),
        };

        let entry = converter.convert(&item, &clock()).unwrap();
        assert_eq!(entry.key(), "session.s1");
        assert_eq!(entry.get(), Some(&json!({"user": "ann"})));
    }

    #[test]
    fn test_registered_adapters_precede_default() {
        let mut converter = EntryConverter::new();
        converter.register(Arc::new(SessionAdapter));
        assert_eq!(converter.adapter_names(), vec!["session", "default"]);
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let clock = clock();
        let entry = CacheEntry::new("k", Arc::clone(&clock));
        let err = EntryConverter::empty().convert(&entry, &clock).unwrap_err();
        assert!(matches!(
            err,
            TableCacheError::Validation(ValidationError::UnsupportedEntryType { .. })
        ));
    }
}
