//! Cache entry encoding (bincode)

use crate::error::{CacheError, CacheResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn encode<V: Serialize>(value: &V) -> CacheResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CacheError::Encode(e.to_string()))
}

pub fn decode<V: DeserializeOwned>(bytes: &[u8]) -> CacheResult<V> {
    bincode::deserialize(bytes).map_err(|e| CacheError::Decode(e.to_string()))
}
