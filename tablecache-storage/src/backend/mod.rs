//! Table store backends.
//!
//! [`TableStore`] is the boundary to the remote key-value table. The wire
//! protocol lives behind it; this crate ships two local implementations that
//! honour the same contract.

pub mod lmdb;
pub mod memory;
pub mod traits;

pub use lmdb::{LmdbStoreError, LmdbTableStore};
pub use memory::InMemoryTableStore;
pub use traits::{AttributeValue, BatchGetOutput, ItemKey, Row, TableStore};
