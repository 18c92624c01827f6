//! In-memory table store.
//!
//! Behaves like the remote store as far as the pool can observe: tables must
//! be created before use, unknown tables report `ResourceNotFound`, and an
//! optional batch limit leaves the tail of large batch reads unprocessed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tablecache_core::{BackendError, BackendResult};

use super::traits::{BatchGetOutput, ItemKey, Row, TableStore};

#[derive(Debug)]
struct Table {
    key_attribute: String,
    rows: HashMap<String, Row>,
}

impl Table {
    fn key_value<'k>(&self, table: &str, key: &'k ItemKey) -> BackendResult<&'k str> {
        if key.attribute != self.key_attribute {
            return Err(BackendError::RequestFailed {
                table: table.to_string(),
                reason: format!(
                    "key attribute {} does not match table key {}",
                    key.attribute, self.key_attribute
                ),
            });
        }
        Ok(&key.value)
    }
}

/// In-memory table store for tests and local development.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    batch_limit: Option<usize>,
}

impl InMemoryTableStore {
    /// Create a store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of keys a single batch call processes.
    ///
    /// Batch reads past the cap report the remaining keys as unprocessed;
    /// batch deletes past the cap are rejected outright.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    /// Create (or reset) a table keyed by `key_attribute`.
    pub fn create_table(&self, name: impl Into<String>, key_attribute: impl Into<String>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(
                name.into(),
                Table {
                    key_attribute: key_attribute.into(),
                    rows: HashMap::new(),
                },
            );
        }
    }

    /// Drop a table. Returns true if it existed.
    pub fn drop_table(&self, name: &str) -> bool {
        self.tables
            .write()
            .map(|mut tables| tables.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Number of rows in a table (zero if the table is missing).
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }

    /// Raw row lookup, bypassing the async contract.
    pub fn row(&self, table: &str, key: &str) -> Option<Row> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).and_then(|t| t.rows.get(key).cloned()))
    }

    fn read<T>(
        &self,
        table: &str,
        f: impl FnOnce(&Table) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let tables = self.tables.read().map_err(|_| poisoned(table))?;
        let t = tables.get(table).ok_or_else(|| not_found(table))?;
        f(t)
    }

    fn write<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut tables = self.tables.write().map_err(|_| poisoned(table))?;
        let t = tables.get_mut(table).ok_or_else(|| not_found(table))?;
        f(t)
    }
}

fn not_found(table: &str) -> BackendError {
    BackendError::ResourceNotFound {
        table: table.to_string(),
    }
}

fn poisoned(table: &str) -> BackendError {
    BackendError::RequestFailed {
        table: table.to_string(),
        reason: "table lock poisoned".to_string(),
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>> {
        self.read(table, |t| {
            let value = t.key_value(table, key)?;
            Ok(t.rows.get(value).cloned())
        })
    }

    async fn batch_get_items(
        &self,
        table: &str,
        keys: &[ItemKey],
    ) -> BackendResult<BatchGetOutput> {
        self.read(table, |t| {
            let limit = self.batch_limit.unwrap_or(usize::MAX);
            let mut output = BatchGetOutput::default();
            for (i, key) in keys.iter().enumerate() {
                if i >= limit {
                    output.unprocessed_keys.push(key.clone());
                    continue;
                }
                let value = t.key_value(table, key)?;
                if let Some(row) = t.rows.get(value) {
                    output.rows.push(row.clone());
                }
            }
            Ok(output)
        })
    }

    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()> {
        self.write(table, |t| {
            let key = row
                .get_str(&t.key_attribute)
                .ok_or_else(|| BackendError::RequestFailed {
                    table: table.to_string(),
                    reason: format!("row is missing string key attribute {}", t.key_attribute),
                })?
                .to_string();
            t.rows.insert(key, row);
            Ok(())
        })
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<()> {
        self.write(table, |t| {
            let value = t.key_value(table, key)?;
            t.rows.remove(value);
            Ok(())
        })
    }

    async fn batch_delete_items(&self, table: &str, keys: &[ItemKey]) -> BackendResult<()> {
        if let Some(limit) = self.batch_limit {
            if keys.len() > limit {
                return Err(BackendError::RequestFailed {
                    table: table.to_string(),
                    reason: format!("batch of {} keys exceeds limit {}", keys.len(), limit),
                });
            }
        }
        self.write(table, |t| {
            for key in keys {
                let value = t.key_value(table, key)?.to_string();
                t.rows.remove(&value);
            }
            Ok(())
        })
    }
}
