//! Consistent hash ring
//!
//! Maps an arbitrary key to one of a fixed set of registered shards. Each
//! shard owns `replicas` virtual-node positions on a 64-bit ring; a key is
//! owned by the first position at or after its hash, wrapping around to the
//! smallest position.
//!
//! ```text
//!   0 ──●────●──────●───●──────────●──── u64::MAX
//!       s1   s0     s2  s1         s0
//!                ▲
//!            hash(key) ──► next position ► s2
//! ```
//!
//! Adding a shard only moves the keys that now land on one of its new
//! positions; every other key keeps its owner.

use std::collections::BTreeMap;
use thiserror::Error;
use xxhash_rust::xxh64::xxh64;

/// Opaque shard identifier
pub type ShardId = usize;

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 0x0001_0203_0405_0607;

/// Errors returned by ring operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("hash ring is empty")]
    Empty,
    #[error("replication factor must be positive")]
    InvalidReplication,
    #[error("shard {0} is already registered")]
    DuplicateShard(ShardId),
    #[error("shard {0} is not registered")]
    UnknownShard(ShardId),
}

/// Consistent hash ring with virtual-node replication
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    seed: u64,
    positions: BTreeMap<u64, ShardId>,
    shards: Vec<ShardId>,
}

impl HashRing {
    /// Create an empty ring placing `replicas` virtual nodes per shard
    pub fn new(replicas: usize) -> Result<Self, RingError> {
        Self::with_seed(replicas, DEFAULT_SEED)
    }

    /// Create an empty ring hashing with a custom seed
    pub fn with_seed(replicas: usize, seed: u64) -> Result<Self, RingError> {
        if replicas == 0 {
            return Err(RingError::InvalidReplication);
        }
        Ok(Self {
            replicas,
            seed,
            positions: BTreeMap::new(),
            shards: Vec::new(),
        })
    }

    /// Build a ring holding shards `0..count`
    pub fn with_shards(replicas: usize, seed: u64, count: usize) -> Result<Self, RingError> {
        let mut ring = Self::with_seed(replicas, seed)?;
        for shard in 0..count {
            ring.add(shard)?;
        }
        Ok(ring)
    }

    /// Register a shard, placing its virtual nodes on the ring
    pub fn add(&mut self, shard: ShardId) -> Result<(), RingError> {
        if self.shards.contains(&shard) {
            return Err(RingError::DuplicateShard(shard));
        }
        for vnode in 0..self.replicas {
            // On the (rare) collision the earlier shard keeps the position
            self.positions
                .entry(self.vnode_hash(shard, vnode))
                .or_insert(shard);
        }
        self.shards.push(shard);
        Ok(())
    }

    /// Unregister a shard; its keys move to the next positions on the ring
    pub fn remove(&mut self, shard: ShardId) -> Result<(), RingError> {
        let idx = self
            .shards
            .iter()
            .position(|s| *s == shard)
            .ok_or(RingError::UnknownShard(shard))?;
        self.shards.remove(idx);
        self.positions.retain(|_, owner| *owner != shard);
        Ok(())
    }

    /// Find the shard owning `key`
    pub fn locate(&self, key: &str) -> Result<ShardId, RingError> {
        let hash = xxh64(key.as_bytes(), self.seed);
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, shard)| *shard)
            .ok_or(RingError::Empty)
    }

    /// Registered shards in insertion order
    #[must_use]
    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }

    /// Number of registered shards
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Virtual nodes per shard
    #[must_use]
    pub const fn replicas(&self) -> usize {
        self.replicas
    }

    fn vnode_hash(&self, shard: ShardId, vnode: usize) -> u64 {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&(shard as u64).to_le_bytes());
        buf[8..].copy_from_slice(&(vnode as u64).to_le_bytes());
        xxh64(&buf, self.seed)
    }
}
