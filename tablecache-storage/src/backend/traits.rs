//! Table store contract and row shape.
//!
//! The pool talks to the remote store only through [`TableStore`]. Rows are
//! flat maps of named attributes keyed by a single primary attribute; the
//! pool decides which attribute names carry the key, value and ttl.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablecache_core::BackendResult;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Number(i64),
}

impl AttributeValue {
    /// The string payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// The integer payload, if this is a number attribute.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// One stored row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// String attribute lookup; `None` if absent or not a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Number attribute lookup; `None` if absent or not a number.
    pub fn get_number(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttributeValue::as_number)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Primary-key selector for a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub attribute: String,
    pub value: String,
}

impl ItemKey {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Result of a batch read.
///
/// Keys that do not exist are simply absent from `rows`. Keys the store did
/// not get to (throttling, paging limits) are listed in `unprocessed_keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetOutput {
    pub rows: Vec<Row>,
    pub unprocessed_keys: Vec<ItemKey>,
}

/// Key-value table store consumed by the cache pool.
///
/// Each method is one round trip. Implementations must report a missing
/// table as [`BackendError::ResourceNotFound`](tablecache_core::BackendError::ResourceNotFound)
/// so callers can tell misconfiguration apart from transient failures.
/// Retries and timeouts belong to the implementation, not to the pool.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Read a single row.
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>>;

    /// Read many rows in one call.
    async fn batch_get_items(&self, table: &str, keys: &[ItemKey])
        -> BackendResult<BatchGetOutput>;

    /// Unconditional upsert.
    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()>;

    /// Idempotent delete.
    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<()>;

    /// Best-effort batch delete.
    async fn batch_delete_items(&self, table: &str, keys: &[ItemKey]) -> BackendResult<()>;
}
