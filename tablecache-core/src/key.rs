//! Cache key validation.
//!
//! Keys travel verbatim into the table's primary-key attribute, so a small
//! set of characters is reserved and rejected up front. Validation never
//! touches the backend.

use crate::error::ValidationError;

/// Characters that may not appear in a cache key.
pub const RESERVED_CHARACTERS: &str = "{}()/\\@:";

/// Check a single key.
///
/// Fails with [`ValidationError::EmptyKey`] for `""` and with
/// [`ValidationError::InvalidKey`] when any reserved character is present.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.chars().any(|c| RESERVED_CHARACTERS.contains(c)) {
        return Err(ValidationError::InvalidKey {
            key: key.to_string(),
            reserved: RESERVED_CHARACTERS.to_string(),
        });
    }
    Ok(())
}

/// Check every key, stopping at the first offender.
pub fn validate_keys<K: AsRef<str>>(keys: &[K]) -> Result<(), ValidationError> {
    keys.iter().try_for_each(|key| validate_key(key.as_ref()))
}
