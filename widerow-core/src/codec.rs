//! Conversion between application key types and wire row keys.
//!
//! A [`KeyCodec`] is passed explicitly to every keyspace operation, which lets
//! any key type take part in reads and writes without the keyspace knowing it.
//!
//! # Example
//!
//! ```
//! use widerow_core::codec::{KeyCodec, LongCodec};
//!
//! let bytes = LongCodec.to_bytes(&42).unwrap();
//! assert_eq!(LongCodec.from_bytes(&bytes).unwrap(), 42);
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Result, WideRowError};

/// Converts keys of one application type to and from row-key bytes.
///
/// Implementations must round-trip: `from_bytes(&to_bytes(k)?)? == k`.
pub trait KeyCodec: Send + Sync {
    /// The application key type.
    type Key: Send + Sync;

    /// Encodes a single key.
    fn to_bytes(&self, key: &Self::Key) -> Result<Bytes>;

    /// Decodes a single key.
    fn from_bytes(&self, bytes: &[u8]) -> Result<Self::Key>;

    /// Encodes a list of keys, preserving order.
    fn to_bytes_list(&self, keys: &[Self::Key]) -> Result<Vec<Bytes>> {
        keys.iter().map(|key| self.to_bytes(key)).collect()
    }

    /// Re-keys a map by the encoded form of each key.
    fn to_bytes_map<V: Clone>(&self, map: &HashMap<Self::Key, V>) -> Result<HashMap<Bytes, V>> {
        map.iter()
            .map(|(key, value)| Ok((self.to_bytes(key)?, value.clone())))
            .collect()
    }
}

/// UTF-8 string keys. The default codec for string-keyed convenience methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringCodec;

impl KeyCodec for StringCodec {
    type Key = String;

    fn to_bytes(&self, key: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(key.as_bytes()))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| WideRowError::Serialization(format!("row key is not valid UTF-8: {e}")))
    }
}

/// Raw byte keys, passed through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytesCodec;

impl KeyCodec for BytesCodec {
    type Key = Bytes;

    fn to_bytes(&self, key: &Bytes) -> Result<Bytes> {
        Ok(key.clone())
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// Signed 64-bit keys as 8 big-endian bytes, so byte order matches numeric order
/// for non-negative values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LongCodec;

impl KeyCodec for LongCodec {
    type Key = i64;

    fn to_bytes(&self, key: &i64) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(&key.to_be_bytes()))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<i64> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            WideRowError::Serialization(format!(
                "long key must be 8 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(i64::from_be_bytes(raw))
    }
}

/// UUID keys as their 16 raw bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UuidCodec;

impl KeyCodec for UuidCodec {
    type Key = Uuid;

    fn to_bytes(&self, key: &Uuid) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(key.as_bytes()))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Uuid> {
        Uuid::from_slice(bytes)
            .map_err(|e| WideRowError::Serialization(format!("invalid UUID key: {e}")))
    }
}
