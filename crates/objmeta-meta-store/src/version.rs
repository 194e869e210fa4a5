//! Version token source

use objmeta_common::now_nanos;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing nanosecond timestamps.
///
/// Two writes in the same nanosecond, or a wall clock stepping backwards,
/// still get distinct and ordered values, so version tokens derived from
/// them never repeat within a process.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> u64 {
        let now = now_nanos();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}
