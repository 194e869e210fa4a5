//! Configuration types for objmeta
//!
//! Configuration is read from a TOML file and may be overridden by
//! `OBJMETA__<SECTION>__<FIELD>` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Virtual nodes placed on a ring per registered shard
pub const DEFAULT_RING_REPLICAS: usize = 4096;

/// Fixed hash seed so that routing is stable across restarts
pub const DEFAULT_RING_SEED: u64 = 0x0001_0203_0405_0607;

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consistent hash ring configuration
    pub ring: RingConfig,
    /// Metadata cache configuration
    pub cache: CacheConfig,
    /// Metadata store configuration
    pub store: StoreConfig,
    /// Log sink configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from `path`, layering environment overrides on top
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix("OBJMETA").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Configuration(e.to_string()))
    }
}

/// Consistent hash ring configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Virtual nodes per shard
    pub replicas: usize,
    /// Hash seed
    pub seed: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_RING_REPLICAS,
            seed: DEFAULT_RING_SEED,
        }
    }
}

/// Metadata cache configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of cache shards
    pub shards: usize,
    /// Entries held by each shard
    pub capacity_per_shard: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            capacity_per_shard: 4096,
        }
    }
}

/// Metadata store configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the database file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/objmeta/meta.redb"),
        }
    }
}

/// Log sink configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log files; requests are spread across them by request id.
    /// Empty means stderr.
    pub paths: Vec<PathBuf>,
    /// `info`, `warn` or `error`
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            level: "info".to_string(),
        }
    }
}
