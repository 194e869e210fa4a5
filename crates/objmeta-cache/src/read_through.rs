//! Typed read-through cache
//!
//! Wraps a byte-oriented [`CacheBackend`] and binds it to one record type.
//! Misses are filled from a caller-supplied fetch closure; writers keep the
//! cache coherent by invalidating keys they change. Entries never expire.

use crate::backend::CacheBackend;
use crate::codec;
use crate::error::CacheError;
use crate::sharded::ShardedCache;
use objmeta_common::VersionId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Logical table holding object records
pub const OBJECT_TABLE: &str = "objects";

/// Key of the latest-version pointer of an object
#[must_use]
pub fn latest_key(bucket: &str, name: &str) -> String {
    format!("{bucket}:{name}:")
}

/// Key of one specific version of an object
#[must_use]
pub fn version_key(bucket: &str, name: &str, version: &VersionId) -> String {
    format!("{bucket}:{name}:{version}")
}

fn cache_key(table: &str, key: &str) -> String {
    format!("{table}:{key}")
}

/// Read-through cache holding values of type `V`
pub struct ReadThroughCache<V, B = ShardedCache> {
    backend: B,
    _value: PhantomData<fn() -> V>,
}

impl<V, B> ReadThroughCache<V, B>
where
    V: Serialize + DeserializeOwned,
    B: CacheBackend,
{
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            _value: PhantomData,
        }
    }

    /// Return the cached value for `table:key`, or fill it from `fetch`.
    ///
    /// `fetch` runs at most once and only on a miss. Its error is returned
    /// untouched. With `eager` set, a fetched value is written back; a
    /// failed write-back only logs.
    ///
    /// Coherence is best effort. A write that invalidates `key` while a
    /// miss is fetching can be overtaken by the write-back, leaving the
    /// fetched (older) value cached until the next invalidation of `key`.
    pub fn get<E, F>(&self, table: &str, key: &str, fetch: F, eager: bool) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
        E: From<CacheError>,
    {
        let cache_key = cache_key(table, key);

        if let Some(bytes) = self.backend.get(&cache_key) {
            return codec::decode(&bytes).map_err(|e| {
                warn!(key = %cache_key, error = %e, "Dropping undecodable cache entry");
                self.backend.remove(&cache_key);
                E::from(e)
            });
        }

        debug!(key = %cache_key, "Cache miss");
        let value = fetch()?;

        if eager {
            if let Err(e) = codec::encode(&value).and_then(|b| self.backend.set(&cache_key, b)) {
                warn!(key = %cache_key, error = %e, "Failed to populate cache");
            }
        }
        Ok(value)
    }

    /// Drop `table:key` so the next read goes to the source
    pub fn invalidate(&self, table: &str, key: &str) {
        self.backend.remove(&cache_key(table, key));
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }
}
