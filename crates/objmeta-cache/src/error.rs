//! Cache error types

use objmeta_placement::RingError;
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cache entry: {0}")]
    Encode(String),

    /// A cached entry could not be read back as the requested type
    #[error("failed to decode cache entry: {0}")]
    Decode(String),

    #[error("cache shard routing failed: {0}")]
    Routing(#[from] RingError),
}

impl From<CacheError> for objmeta_common::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Encode(msg) => Self::Serialization(msg),
            CacheError::Decode(msg) => Self::Internal(format!("cached value type mismatch: {msg}")),
            CacheError::Routing(e) => Self::Internal(e.to_string()),
        }
    }
}
