//! Ring-routed set of ARC shards

use crate::arc::ArcCache;
use crate::backend::CacheBackend;
use crate::error::CacheResult;
use objmeta_common::config::{CacheConfig, RingConfig};
use objmeta_placement::{HashRing, RingError};
use std::sync::atomic::Ordering;

/// Cache split into independently locked shards.
///
/// The consistent hash ring picks the shard owning each key, so
/// contention on one shard's lock only affects a slice of the keyspace.
pub struct ShardedCache {
    ring: HashRing,
    shards: Vec<ArcCache>,
}

impl ShardedCache {
    pub fn new(
        shard_count: usize,
        capacity_per_shard: usize,
        replicas: usize,
        seed: u64,
    ) -> CacheResult<Self> {
        if shard_count == 0 {
            return Err(RingError::Empty.into());
        }
        let ring = HashRing::with_shards(replicas, seed, shard_count)?;
        let shards = (0..shard_count)
            .map(|_| ArcCache::new(capacity_per_shard))
            .collect();
        Ok(Self { ring, shards })
    }

    pub fn from_config(cache: &CacheConfig, ring: &RingConfig) -> CacheResult<Self> {
        Self::new(
            cache.shards,
            cache.capacity_per_shard,
            ring.replicas,
            ring.seed,
        )
    }

    fn shard(&self, key: &str) -> CacheResult<&ArcCache> {
        let id = self.ring.locate(key)?;
        self.shards
            .get(id)
            .ok_or_else(|| RingError::UnknownShard(id).into())
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Entries resident across all shards
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(ArcCache::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) summed over all shards
    #[must_use]
    pub fn hits_and_misses(&self) -> (u64, u64) {
        self.shards.iter().fold((0, 0), |(h, m), shard| {
            let stats = shard.stats();
            (
                h + stats.hits.load(Ordering::Relaxed),
                m + stats.misses.load(Ordering::Relaxed),
            )
        })
    }
}

impl CacheBackend for ShardedCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.shard(key).ok()?.get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.shard(key)?.put(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(shard) = self.shard(key) {
            shard.remove(key);
        }
    }
}
