//! Value codecs.
//!
//! The value attribute is a string; a [`ValueCodec`] turns cache values into
//! that string and back. The pool takes any codec, JSON is the default.

use serde_json::Value;
use tablecache_core::CodecError;

/// Converts cache values to and from their stored string form.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    /// `key` is only used for error reporting.
    fn decode(&self, key: &str, raw: &str) -> Result<Value, CodecError>;
}

/// JSON text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn decode(&self, key: &str, raw: &str) -> Result<Value, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
