//! Byte-oriented cache backend

use crate::error::CacheResult;

/// Key/value store backing a [`crate::ReadThroughCache`].
///
/// Values are opaque bytes; typing is the caller's concern.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Remove `key`; removing an absent key is a no-op
    fn remove(&self, key: &str);
}
