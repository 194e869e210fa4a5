//! objmeta Placement - consistent hash routing
//!
//! This crate implements the consistent hash ring used to route a key to one
//! of a fixed set of backing shards without central coordination. It is
//! used to pick the log sink for a request and the cache shard for a
//! metadata key.
//!
//! # Example
//! ```
//! use objmeta_placement::HashRing;
//!
//! let mut ring = HashRing::new(4096).unwrap();
//! ring.add(0).unwrap();
//! ring.add(1).unwrap();
//! let shard = ring.locate("bucket:object:").unwrap();
//! assert!(shard < 2);
//! ```

pub mod ring;

pub use ring::{DEFAULT_SEED, HashRing, RingError, ShardId};
