//! objmeta Cache - read-through metadata cache
//!
//! Object metadata lookups go through a [`ReadThroughCache`] backed by a
//! [`ShardedCache`]: a set of ARC shards with keys routed by the consistent
//! hash ring.

pub mod arc;
pub mod backend;
pub mod codec;
pub mod error;
pub mod read_through;
pub mod sharded;

pub use arc::{ArcCache, CacheStats};
pub use backend::CacheBackend;
pub use error::{CacheError, CacheResult};
pub use read_through::{OBJECT_TABLE, ReadThroughCache, latest_key, version_key};
pub use sharded::ShardedCache;
