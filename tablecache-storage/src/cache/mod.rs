//! Cache item pool layer.
//!
//! Callers work with [`CacheEntry`] values produced by a [`CachePool`]. The
//! pool talks to a [`TableStore`](crate::backend::TableStore) and never keeps
//! entries between calls, except for writes buffered with
//! [`CachePool::save_deferred`].
//!
//! # Example
//!
//! ```ignore
//! let mut entry = pool.get_item("profile.42").await?;
//! if !entry.is_hit() {
//!     entry.set(load_profile(42)?).expires_after(Some(Duration::from_secs(3600)));
//!     pool.save(&entry).await?;
//! }
//! ```

pub mod codec;
pub mod converter;
pub mod entry;
pub mod pool;
pub mod traits;

pub use codec::{JsonCodec, ValueCodec};
pub use converter::{DefaultEntryAdapter, EntryAdapter, EntryConverter};
pub use entry::CacheEntry;
pub use pool::CachePool;
pub use traits::{CacheItem, ItemKind};
