//! The generic cache item capability set.
//!
//! Anything that can report a key, a value, a hit flag and an expiration can
//! be handed to the pool for saving. The [`ItemKind`] tag tells the
//! [`EntryConverter`](super::converter::EntryConverter) which adapter knows
//! how to turn it into a [`CacheEntry`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::entry::CacheEntry;

/// Shape tag used for adapter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// A [`CacheEntry`] produced by this crate.
    Native,
    /// Any other item that is fully described by its accessors.
    Generic,
    /// An application-specific shape handled by a registered adapter.
    Custom(&'static str),
}

/// Capability set shared by every cache item.
///
/// # Implementation Requirements
///
/// - `key()` must be stable for the lifetime of the item
/// - `value()` returns an owned copy; `None` means no value is set
/// - `kind()` must return the same tag for all instances of a type
pub trait CacheItem: Send + Sync {
    fn key(&self) -> &str;

    fn value(&self) -> Option<Value>;

    fn is_hit(&self) -> bool;

    fn expiration(&self) -> Option<DateTime<Utc>>;

    fn kind(&self) -> ItemKind {
        ItemKind::Generic
    }

    /// Borrow the native entry, if this is one.
    fn as_entry(&self) -> Option<&CacheEntry> {
        None
    }
}
