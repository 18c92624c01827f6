//! Error types for tablecache operations

use thiserror::Error;

/// Caller errors raised before any backend call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cache key \"{key}\" contains reserved characters {reserved}")]
    InvalidKey { key: String, reserved: String },

    #[error("Cache key length must be greater than zero")]
    EmptyKey,

    #[error("No entry adapter supports items of kind {kind}")]
    UnsupportedEntryType { kind: String },
}

/// Failures reported by the remote table store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Table not found: {table}")]
    ResourceNotFound { table: String },

    #[error("Request to table {table} failed: {reason}")]
    RequestFailed { table: String, reason: String },

    #[error("Request to table {table} was throttled")]
    Throttled { table: String },

    #[error("Malformed row in table {table}: {reason}")]
    MalformedRow { table: String, reason: String },
}

impl BackendError {
    /// True for the "table itself is absent" condition.
    pub fn is_resource_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}

/// Value serialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode value: {reason}")]
    Encode { reason: String },

    #[error("Failed to decode value stored under \"{key}\": {reason}")]
    Decode { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all tablecache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableCacheError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TableCacheError {
    /// True when the error is a rejected cache key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(
            self,
            Self::Validation(ValidationError::InvalidKey { .. } | ValidationError::EmptyKey)
        )
    }
}

/// Result type alias for tablecache operations.
pub type TableCacheResult<T> = Result<T, TableCacheError>;

/// Result type alias for table store calls.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// TESTS
// =============================================================================
