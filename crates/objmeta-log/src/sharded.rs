//! Log sinks sharded by request id
//!
//! Every request is pinned to one sink by hashing its id onto a consistent
//! hash ring, so all lines of a request land in the same file while the
//! overall volume is spread across several files. Code running inside a
//! [`RequestScope`] writes to its request's sink; anything logged outside
//! a scope goes to the first sink.

use objmeta_placement::{DEFAULT_SEED, HashRing, RingError, ShardId};
use parking_lot::Mutex;
use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::span::EnteredSpan;
use tracing_subscriber::fmt::MakeWriter;

/// Virtual nodes per log sink
pub const LOG_RING_REPLICAS: usize = 4096;

thread_local! {
    static CURRENT_SHARD: Cell<Option<ShardId>> = const { Cell::new(None) };
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log file {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("log routing error: {0}")]
    Ring(#[from] RingError),

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

type Sink = Mutex<Box<dyn Write + Send>>;

struct Inner {
    ring: HashRing,
    sinks: Vec<Sink>,
}

/// A set of log sinks selected per request
#[derive(Clone)]
pub struct ShardedLog {
    inner: Arc<Inner>,
}

impl ShardedLog {
    /// Open (or create) each path in append mode, one sink per path.
    /// `seed` is the ring's hash seed.
    pub fn open<P: AsRef<Path>>(
        paths: &[P],
        replicas: usize,
        seed: u64,
    ) -> Result<Self, LogError> {
        let mut writers: Vec<Box<dyn Write + Send>> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
            writers.push(Box::new(file));
        }
        Self::from_writers(writers, replicas, seed)
    }

    /// Build from arbitrary writers; sink `i` is `writers[i]`
    pub fn from_writers(
        writers: Vec<Box<dyn Write + Send>>,
        replicas: usize,
        seed: u64,
    ) -> Result<Self, LogError> {
        let ring = HashRing::with_shards(replicas, seed, writers.len())?;
        if ring.is_empty() {
            return Err(RingError::Empty.into());
        }
        Ok(Self {
            inner: Arc::new(Inner {
                ring,
                sinks: writers.into_iter().map(Mutex::new).collect(),
            }),
        })
    }

    /// A single sink writing to stderr
    pub fn stderr() -> Result<Self, LogError> {
        Self::from_writers(vec![Box::new(io::stderr())], 1, DEFAULT_SEED)
    }

    /// Sink owning `request_id`
    pub fn locate(&self, request_id: &str) -> Result<ShardId, LogError> {
        Ok(self.inner.ring.locate(request_id)?)
    }

    /// Route this thread's log output to `request_id`'s sink until the
    /// returned scope is dropped
    pub fn enter(&self, request_id: &str) -> Result<RequestScope, LogError> {
        let shard = self.locate(request_id)?;
        let previous = CURRENT_SHARD.with(|current| current.replace(Some(shard)));
        let span = tracing::info_span!("request", request_id = %request_id).entered();
        Ok(RequestScope {
            previous,
            _span: span,
        })
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.inner.sinks.len()
    }

    fn write_to(&self, shard: ShardId, buf: &[u8]) -> io::Result<usize> {
        let sink = self
            .inner
            .sinks
            .get(shard)
            .or_else(|| self.inner.sinks.first())
            .ok_or_else(|| io::Error::other("no log sinks"))?;
        sink.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush_shard(&self, shard: ShardId) -> io::Result<()> {
        match self.inner.sinks.get(shard) {
            Some(sink) => sink.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Keeps a request's sink selected for the current thread
pub struct RequestScope {
    previous: Option<ShardId>,
    _span: EnteredSpan,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        CURRENT_SHARD.with(|current| current.set(self.previous));
    }
}

/// Writer for one formatted event
pub struct ShardWriter<'a> {
    log: &'a ShardedLog,
    shard: ShardId,
}

impl Write for ShardWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.write_to(self.shard, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.flush_shard(self.shard)
    }
}

impl<'a> MakeWriter<'a> for ShardedLog {
    type Writer = ShardWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        ShardWriter {
            log: self,
            shard: CURRENT_SHARD.with(Cell::get).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn buffered(count: usize) -> (ShardedLog, Vec<SharedBuf>) {
        let bufs: Vec<SharedBuf> = (0..count).map(|_| SharedBuf::default()).collect();
        let writers = bufs
            .iter()
            .map(|b| Box::new(b.clone()) as Box<dyn Write + Send>)
            .collect();
        (ShardedLog::from_writers(writers, 256, DEFAULT_SEED).unwrap(), bufs)
    }

    fn subscriber(log: ShardedLog) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(log)
            .with_ansi(false)
            .finish()
    }

    #[test]
    fn test_no_writers_rejected() {
        assert!(matches!(
            ShardedLog::from_writers(Vec::new(), 16, DEFAULT_SEED),
            Err(LogError::Ring(RingError::Empty))
        ));
    }

    #[test]
    fn test_locate_is_stable() {
        let (log, _) = buffered(4);
        for i in 0..100 {
            let id = format!("req-{i}");
            let shard = log.locate(&id).unwrap();
            assert!(shard < 4);
            assert_eq!(shard, log.locate(&id).unwrap());
        }
    }

    #[test]
    fn test_seed_selects_routing() {
        let writers = |n: usize| {
            (0..n)
                .map(|_| Box::new(io::sink()) as Box<dyn Write + Send>)
                .collect::<Vec<_>>()
        };
        let seeded = ShardedLog::from_writers(writers(4), 256, 42).unwrap();
        let default = ShardedLog::from_writers(writers(4), 256, DEFAULT_SEED).unwrap();
        let ring = HashRing::with_shards(256, 42, 4).unwrap();

        let mut moved = 0;
        for i in 0..200 {
            let id = format!("req-{i}");
            assert_eq!(seeded.locate(&id).unwrap(), ring.locate(&id).unwrap());
            if seeded.locate(&id).unwrap() != default.locate(&id).unwrap() {
                moved += 1;
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn test_request_lines_land_in_one_sink() {
        let (log, bufs) = buffered(4);
        let request_id = "7b4f0c2e-request";
        let shard = log.locate(request_id).unwrap();

        tracing::subscriber::with_default(subscriber(log.clone()), || {
            let _scope = log.enter(request_id).unwrap();
            info!("Start serving");
            warn!("Completed");
        });

        let owned = bufs[shard].contents();
        assert!(owned.contains("Start serving"));
        assert!(owned.contains("Completed"));
        assert!(owned.contains(request_id));
        for (i, buf) in bufs.iter().enumerate() {
            if i != shard {
                assert!(buf.contents().is_empty(), "sink {i} got output");
            }
        }
    }

    #[test]
    fn test_unscoped_events_go_to_first_sink() {
        let (log, bufs) = buffered(3);
        tracing::subscriber::with_default(subscriber(log.clone()), || {
            info!("background task");
        });
        assert!(bufs[0].contents().contains("background task"));
        assert!(bufs[1].contents().is_empty());
        assert!(bufs[2].contents().is_empty());
    }

    #[test]
    fn test_scope_restores_previous_sink() {
        let (log, _) = buffered(2);
        {
            let _outer = log.enter("a").unwrap();
            let outer = CURRENT_SHARD.with(Cell::get);
            {
                let _inner = log.enter("b").unwrap();
            }
            assert_eq!(CURRENT_SHARD.with(Cell::get), outer);
        }
        assert_eq!(CURRENT_SHARD.with(Cell::get), None);
    }

    #[test]
    fn test_open_appends_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("a.log"), dir.path().join("b.log")];
        std::fs::write(&paths[0], "existing\n").unwrap();

        let log = ShardedLog::open(&paths, LOG_RING_REPLICAS, DEFAULT_SEED).unwrap();
        assert_eq!(log.sink_count(), 2);

        tracing::subscriber::with_default(subscriber(log.clone()), || {
            info!("appended line");
        });

        let first = std::fs::read_to_string(&paths[0]).unwrap();
        assert!(first.starts_with("existing\n"));
        assert!(first.contains("appended line"));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("missing").join("a.log")];
        assert!(matches!(
            ShardedLog::open(&paths, 16, DEFAULT_SEED),
            Err(LogError::Open { .. })
        ));
    }
}
