//! objmeta Log - request-sharded logging
//!
//! Installs the process-wide `tracing` subscriber. Output is spread over
//! the configured log files by request id; see [`ShardedLog`].

pub mod level;
pub mod sharded;

pub use level::LogLevel;
pub use sharded::{LOG_RING_REPLICAS, LogError, RequestScope, ShardWriter, ShardedLog};

use objmeta_common::config::{LogConfig, RingConfig};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` overrides the configured level. Without configured paths
/// everything goes to stderr. Requests are routed over a ring hashed with
/// `ring.seed`. Returns the sinks so callers can open request scopes on
/// them.
pub fn init(config: &LogConfig, ring: &RingConfig) -> Result<ShardedLog, LogError> {
    let log = if config.paths.is_empty() {
        ShardedLog::stderr()?
    } else {
        ShardedLog::open(&config.paths, LOG_RING_REPLICAS, ring.seed)?
    };
    let level = LogLevel::parse(&config.level);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.as_str().into()))
        .with(format_layer(log.clone()))
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))?;

    Ok(log)
}

/// Plain-text lines tagged with the caller's `file:line`
fn format_layer<S>(log: ShardedLog) -> fmt::Layer<S, DefaultFields, Format, ShardedLog>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(log)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
}
