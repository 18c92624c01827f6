//! LMDB-backed table store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to give the pool a durable,
//! local stand-in for the remote table store.
//!
//! # Layout
//!
//! - One named LMDB database per table; keys are the primary-key attribute
//!   value, values are the JSON-encoded [`Row`].
//! - A metadata database (`__tablecache_tables`) maps each table name to its
//!   primary-key attribute. A table without a metadata record does not exist
//!   and reports `ResourceNotFound`.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get_item` and `batch_get_items`
//! - One write transaction per `put_item`, `delete_item` and
//!   `batch_delete_items`, so a batch delete is all-or-nothing here

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use tablecache_core::{BackendError, BackendResult};

use super::traits::{BatchGetOutput, ItemKey, Row, TableStore};

/// Name of the metadata database.
const META_DB: &str = "__tablecache_tables";

/// Error type for opening and administering the LMDB store.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open or create a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The requested table name collides with internal bookkeeping.
    #[error("Reserved table name: {0}")]
    ReservedName(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to BackendError.
impl From<LmdbStoreError> for BackendError {
    fn from(e: LmdbStoreError) -> Self {
        BackendError::RequestFailed {
            table: META_DB.to_string(),
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed table store.
///
/// # Example
///
/// ```ignore
/// use tablecache_storage::backend::LmdbTableStore;
///
/// let store = LmdbTableStore::open("/tmp/tablecache", 64, 16)?;
/// store.create_table("sessions", "id")?;
/// ```
pub struct LmdbTableStore {
    /// The LMDB environment.
    env: Env,
    /// Table name -> primary-key attribute, persisted.
    meta: Database<Str, Str>,
    /// Open table handles and their key attributes.
    tables: RwLock<HashMap<String, TableHandle>>,
}

#[derive(Clone)]
struct TableHandle {
    db: Database<Str, Bytes>,
    key_attribute: String,
}

impl LmdbTableStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    /// * `max_tables` - Maximum number of tables the store can hold
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        max_tables: u32,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store and the files are
        // not modified outside of LMDB while it is open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(max_tables.saturating_add(1))
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let meta: Database<Str, Str> = env
            .create_database(&mut wtxn, Some(META_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        // Open every known table inside this write transaction so the
        // handles stay valid for the lifetime of the environment.
        let known: Vec<(String, String)> = meta
            .iter(&wtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .map(|(name, key_attribute)| (name.to_string(), key_attribute.to_string()))
            .collect();

        let mut tables = HashMap::with_capacity(known.len());
        for (name, key_attribute) in known {
            let db = env
                .open_database::<Str, Bytes>(&wtxn, Some(&name))
                .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
            if let Some(db) = db {
                tables.insert(name, TableHandle { db, key_attribute });
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            meta,
            tables: RwLock::new(tables),
        })
    }

    /// Create a table keyed by `key_attribute`. Existing rows are kept if the
    /// table already exists.
    pub fn create_table(&self, name: &str, key_attribute: &str) -> Result<(), LmdbStoreError> {
        if name == META_DB {
            return Err(LmdbStoreError::ReservedName(name.to_string()));
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let db: Database<Str, Bytes> = self
            .env
            .create_database(&mut wtxn, Some(name))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        self.meta
            .put(&mut wtxn, name, key_attribute)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut tables = self
            .tables
            .write()
            .map_err(|_| LmdbStoreError::Transaction("table registry poisoned".to_string()))?;
        tables.insert(
            name.to_string(),
            TableHandle {
                db,
                key_attribute: key_attribute.to_string(),
            },
        );
        Ok(())
    }

    /// Look up an open table.
    fn table(&self, table: &str) -> BackendResult<TableHandle> {
        let tables = self.tables.read().map_err(|_| BackendError::RequestFailed {
            table: table.to_string(),
            reason: "table registry poisoned".to_string(),
        })?;
        tables.get(table).cloned().ok_or_else(|| not_found(table))
    }

    fn read_row(
        &self,
        rtxn: &RoTxn,
        db: &Database<Str, Bytes>,
        table: &str,
        key: &str,
    ) -> BackendResult<Option<Row>> {
        match db.get(rtxn, key).map_err(|e| request_failed(table, e))? {
            Some(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| BackendError::MalformedRow {
                    table: table.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

fn not_found(table: &str) -> BackendError {
    BackendError::ResourceNotFound {
        table: table.to_string(),
    }
}

fn request_failed(table: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::RequestFailed {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

fn check_attribute(table: &str, key: &ItemKey, key_attribute: &str) -> BackendResult<()> {
    if key.attribute != key_attribute {
        return Err(BackendError::RequestFailed {
            table: table.to_string(),
            reason: format!(
                "key attribute {} does not match table key {}",
                key.attribute, key_attribute
            ),
        });
    }
    Ok(())
}

#[async_trait]
impl TableStore for LmdbTableStore {
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Row>> {
        let TableHandle { db, key_attribute } = self.table(table)?;
        check_attribute(table, key, &key_attribute)?;
        let rtxn = self.env.read_txn().map_err(|e| request_failed(table, e))?;
        self.read_row(&rtxn, &db, table, &key.value)
    }

    async fn batch_get_items(
        &self,
        table: &str,
        keys: &[ItemKey],
    ) -> BackendResult<BatchGetOutput> {
        let TableHandle { db, key_attribute } = self.table(table)?;
        let rtxn = self.env.read_txn().map_err(|e| request_failed(table, e))?;

        let mut output = BatchGetOutput::default();
        for key in keys {
            check_attribute(table, key, &key_attribute)?;
            if let Some(row) = self.read_row(&rtxn, &db, table, &key.value)? {
                output.rows.push(row);
            }
        }
        Ok(output)
    }

    async fn put_item(&self, table: &str, row: Row) -> BackendResult<()> {
        let TableHandle { db, key_attribute } = self.table(table)?;
        let key = row
            .get_str(&key_attribute)
            .ok_or_else(|| BackendError::RequestFailed {
                table: table.to_string(),
                reason: format!("row is missing string key attribute {}", key_attribute),
            })?;
        let bytes = serde_json::to_vec(&row).map_err(|e| request_failed(table, e))?;

        let mut wtxn = self.env.write_txn().map_err(|e| request_failed(table, e))?;
        db.put(&mut wtxn, key, &bytes)
            .map_err(|e| request_failed(table, e))?;
        wtxn.commit().map_err(|e| request_failed(table, e))?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> BackendResult<()> {
        self.batch_delete_items(table, std::slice::from_ref(key))
            .await
    }

    async fn batch_delete_items(&self, table: &str, keys: &[ItemKey]) -> BackendResult<()> {
        let TableHandle { db, key_attribute } = self.table(table)?;
        for key in keys {
            check_attribute(table, key, &key_attribute)?;
        }

        let mut wtxn = self.env.write_txn().map_err(|e| request_failed(table, e))?;
        for key in keys {
            db.delete(&mut wtxn, &key.value)
                .map_err(|e| request_failed(table, e))?;
        }
        wtxn.commit().map_err(|e| request_failed(table, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, LmdbTableStore) {
        let dir = TempDir::new().unwrap();
        let store = LmdbTableStore::open(dir.path(), 10, 4).unwrap();
        store.create_table("cache", "id").unwrap();
        (dir, store)
    }

    fn key(value: &str) -> ItemKey {
        ItemKey::new("id", value)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, store) = open_store();
        let row = Row::new()
            .with("id", "a")
            .with("value", "{\"n\":1}")
            .with("ttl", 1_700_000_000i64);

        store.put_item("cache", row.clone()).await.unwrap();
        assert_eq!(store.get_item("cache", &key("a")).await.unwrap(), Some(row));

        store.delete_item("cache", &key("a")).await.unwrap();
        assert_eq!(store.get_item("cache", &key("a")).await.unwrap(), None);

        // Deleting again is fine.
        store.delete_item("cache", &key("a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_resource_not_found() {
        let (_dir, store) = open_store();
        let err = store.get_item("nope", &key("a")).await.unwrap_err();
        assert!(err.is_resource_not_found());

        let err = store.batch_get_items("nope", &[key("a")]).await.unwrap_err();
        assert!(err.is_resource_not_found());
    }

    #[tokio::test]
    async fn test_batch_get_skips_absent_keys() {
        let (_dir, store) = open_store();
        store
            .put_item("cache", Row::new().with("id", "a").with("value", "1"))
            .await
            .unwrap();
        store
            .put_item("cache", Row::new().with("id", "b").with("value", "2"))
            .await
            .unwrap();

        let output = store
            .batch_get_items("cache", &[key("a"), key("x"), key("b")])
            .await
            .unwrap();
        assert_eq!(output.rows.len(), 2);
        assert!(output.unprocessed_keys.is_empty());
    }

    #[tokio::test]
    async fn test_batch_delete() {
        let (_dir, store) = open_store();
        for id in ["a", "b", "c"] {
            store
                .put_item("cache", Row::new().with("id", id))
                .await
                .unwrap();
        }
        store
            .batch_delete_items("cache", &[key("a"), key("b"), key("missing")])
            .await
            .unwrap();

        assert!(store.get_item("cache", &key("a")).await.unwrap().is_none());
        assert!(store.get_item("cache", &key("c")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LmdbTableStore::open(dir.path(), 10, 4).unwrap();
            store.create_table("cache", "id").unwrap();
            store
                .put_item("cache", Row::new().with("id", "a").with("value", "1"))
                .await
                .unwrap();
        }

        let store = LmdbTableStore::open(dir.path(), 10, 4).unwrap();
        let row = store.get_item("cache", &key("a")).await.unwrap().unwrap();
        assert_eq!(row.get_str("value"), Some("1"));
    }

    #[test]
    fn test_meta_table_name_is_reserved() {
        let (_dir, store) = open_store();
        assert!(matches!(
            store.create_table(META_DB, "id"),
            Err(LmdbStoreError::ReservedName(_))
        ));
    }
}
