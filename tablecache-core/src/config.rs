//! Configuration types

use crate::error::{ConfigError, TableCacheError, TableCacheResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name of the primary-key attribute.
pub const DEFAULT_KEY_ATTRIBUTE: &str = "id";
/// Default name of the expiration attribute.
pub const DEFAULT_TTL_ATTRIBUTE: &str = "ttl";
/// Default name of the serialized value attribute.
pub const DEFAULT_VALUE_ATTRIBUTE: &str = "value";

/// Construction-time settings for a cache pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Table the pool reads and writes.
    pub table_name: String,
    /// Primary-key attribute holding the cache key.
    pub key_attribute: String,
    /// Attribute holding the expiration as epoch seconds.
    pub ttl_attribute: String,
    /// Attribute holding the serialized value.
    pub value_attribute: String,
    /// Lifetime applied to entries saved without an expiration.
    /// `None` keeps such entries forever.
    #[serde(default)]
    pub default_ttl: Option<Duration>,
}

impl PoolConfig {
    /// Config for `table_name` with the default attribute names.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_attribute: DEFAULT_KEY_ATTRIBUTE.to_string(),
            ttl_attribute: DEFAULT_TTL_ATTRIBUTE.to_string(),
            value_attribute: DEFAULT_VALUE_ATTRIBUTE.to_string(),
            default_ttl: None,
        }
    }

    /// Set the primary-key attribute name.
    pub fn with_key_attribute(mut self, name: impl Into<String>) -> Self {
        self.key_attribute = name.into();
        self
    }

    /// Set the ttl attribute name.
    pub fn with_ttl_attribute(mut self, name: impl Into<String>) -> Self {
        self.ttl_attribute = name.into();
        self
    }

    /// Set the value attribute name.
    pub fn with_value_attribute(mut self, name: impl Into<String>) -> Self {
        self.value_attribute = name.into();
        self
    }

    /// Set the lifetime for entries saved without an expiration.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Build a config from environment variables.
    ///
    /// Environment variables:
    /// - `TABLECACHE_TABLE`: table name (required)
    /// - `TABLECACHE_KEY_ATTRIBUTE`: primary-key attribute (default: `id`)
    /// - `TABLECACHE_TTL_ATTRIBUTE`: ttl attribute (default: `ttl`)
    /// - `TABLECACHE_VALUE_ATTRIBUTE`: value attribute (default: `value`)
    /// - `TABLECACHE_DEFAULT_TTL_SECS`: default lifetime in seconds (default: none)
    pub fn from_env() -> TableCacheResult<Self> {
        let table_name = std::env::var("TABLECACHE_TABLE").map_err(|_| {
            TableCacheError::Config(ConfigError::MissingRequired {
                field: "TABLECACHE_TABLE".to_string(),
            })
        })?;

        let mut config = Self::new(table_name);
        if let Ok(name) = std::env::var("TABLECACHE_KEY_ATTRIBUTE") {
            config.key_attribute = name;
        }
        if let Ok(name) = std::env::var("TABLECACHE_TTL_ATTRIBUTE") {
            config.ttl_attribute = name;
        }
        if let Ok(name) = std::env::var("TABLECACHE_VALUE_ATTRIBUTE") {
            config.value_attribute = name;
        }
        if let Ok(raw) = std::env::var("TABLECACHE_DEFAULT_TTL_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                TableCacheError::Config(ConfigError::InvalidValue {
                    field: "TABLECACHE_DEFAULT_TTL_SECS".to_string(),
                    value: raw.clone(),
                    reason: "must be a whole number of seconds".to_string(),
                })
            })?;
            config.default_ttl = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - table and attribute names are non-empty
    /// - the three attribute names are distinct
    /// - `default_ttl`, when set, is positive
    pub fn validate(&self) -> TableCacheResult<()> {
        let names = [
            ("table_name", &self.table_name),
            ("key_attribute", &self.key_attribute),
            ("ttl_attribute", &self.ttl_attribute),
            ("value_attribute", &self.value_attribute),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(TableCacheError::Config(ConfigError::MissingRequired {
                    field: field.to_string(),
                }));
            }
        }

        let attributes = [
            ("key_attribute", &self.key_attribute),
            ("ttl_attribute", &self.ttl_attribute),
            ("value_attribute", &self.value_attribute),
        ];
        for (i, (field_a, a)) in attributes.iter().enumerate() {
            for (field_b, b) in attributes.iter().skip(i + 1) {
                if a == b {
                    return Err(TableCacheError::Config(ConfigError::IncompatibleOptions {
                        option_a: format!("{}={}", field_a, a),
                        option_b: format!("{}={}", field_b, b),
                    }));
                }
            }
        }

        if let Some(ttl) = self.default_ttl {
            if ttl.is_zero() {
                return Err(TableCacheError::Config(ConfigError::InvalidValue {
                    field: "default_ttl".to_string(),
                    value: format!("{:?}", ttl),
                    reason: "default_ttl must be positive".to_string(),
                }));
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
