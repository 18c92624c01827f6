//! tablecache Core - Shared Types
//!
//! Error taxonomy, key validation, clocks, expiration arithmetic and pool
//! configuration. All other tablecache crates depend on this one; it never
//! talks to a backend.

pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    PoolConfig, DEFAULT_KEY_ATTRIBUTE, DEFAULT_TTL_ATTRIBUTE, DEFAULT_VALUE_ATTRIBUTE,
};
pub use error::{
    BackendError, BackendResult, CodecError, ConfigError, TableCacheError, TableCacheResult,
    ValidationError,
};
pub use key::{validate_key, validate_keys, RESERVED_CHARACTERS};
