//! Adaptive Replacement Cache (ARC) shard
//!
//! ARC balances recency against frequency and adapts to the workload:
//!
//! - T1: entries seen once recently
//! - T2: entries seen at least twice
//! - B1: ghost keys recently evicted from T1
//! - B2: ghost keys recently evicted from T2
//!
//! A hit in B1 grows the T1 target `p`, a hit in B2 shrinks it.

use crate::backend::CacheBackend;
use crate::error::CacheResult;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Hit ratio (0.0 to 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum List {
    T1,
    T2,
    B1,
    B2,
}

struct ArcState {
    t1: VecDeque<String>,
    t2: VecDeque<String>,
    b1: VecDeque<String>,
    b2: VecDeque<String>,
    values: HashMap<String, Vec<u8>>,
    /// Target size of T1
    p: usize,
    capacity: usize,
}

impl ArcState {
    fn new(capacity: usize) -> Self {
        Self {
            t1: VecDeque::new(),
            t2: VecDeque::new(),
            b1: VecDeque::new(),
            b2: VecDeque::new(),
            values: HashMap::with_capacity(capacity),
            p: 0,
            capacity,
        }
    }

    fn list(&mut self, list: List) -> &mut VecDeque<String> {
        match list {
            List::T1 => &mut self.t1,
            List::T2 => &mut self.t2,
            List::B1 => &mut self.b1,
            List::B2 => &mut self.b2,
        }
    }

    fn find(&self, key: &str) -> Option<List> {
        [
            (List::T1, &self.t1),
            (List::T2, &self.t2),
            (List::B1, &self.b1),
            (List::B2, &self.b2),
        ]
        .into_iter()
        .find(|(_, keys)| keys.iter().any(|k| k == key))
        .map(|(list, _)| list)
    }

    fn unlink(&mut self, key: &str, list: List) {
        self.list(list).retain(|k| k != key);
    }

    fn resident(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn ghosts(&self) -> usize {
        self.b1.len() + self.b2.len()
    }

    /// Evict one resident entry into the matching ghost list.
    /// Returns whether an entry was evicted.
    fn replace(&mut self, hit_in_b2: bool) -> bool {
        let t1_len = self.t1.len();
        let from_t1 = t1_len > 0 && (t1_len > self.p || (hit_in_b2 && t1_len == self.p));
        let (from, to) = if from_t1 {
            (List::T1, List::B1)
        } else {
            (List::T2, List::B2)
        };
        match self.list(from).pop_front() {
            Some(evicted) => {
                self.values.remove(&evicted);
                self.list(to).push_back(evicted);
                true
            }
            None => false,
        }
    }
}

/// Adaptive Replacement Cache keyed by string
pub struct ArcCache {
    state: Mutex<ArcState>,
    stats: CacheStats,
}

impl ArcCache {
    /// Create a cache holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ArcState::new(capacity.max(1))),
            stats: CacheStats::default(),
        }
    }

    /// Look up `key`, promoting it to T2 on a hit
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        match state.find(key) {
            Some(list @ (List::T1 | List::T2)) => {
                state.unlink(key, list);
                state.t2.push_back(key.to_string());
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                state.values.get(key).cloned()
            }
            _ => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite `key`
    pub fn put(&self, key: &str, value: Vec<u8>) {
        let mut state = self.state.lock();
        let capacity = state.capacity;

        match state.find(key) {
            Some(list @ (List::T1 | List::T2)) => {
                state.unlink(key, list);
            }
            Some(List::B1) => {
                let delta = (state.b2.len() / state.b1.len().max(1)).max(1);
                state.p = (state.p + delta).min(capacity);
                state.unlink(key, List::B1);
                self.evict(&mut state, false);
            }
            Some(List::B2) => {
                let delta = (state.b1.len() / state.b2.len().max(1)).max(1);
                state.p = state.p.saturating_sub(delta);
                state.unlink(key, List::B2);
                self.evict(&mut state, true);
            }
            None => {
                self.make_room_for_new(&mut state);
                state.t1.push_back(key.to_string());
                state.values.insert(key.to_string(), value);
                return;
            }
        }

        state.t2.push_back(key.to_string());
        state.values.insert(key.to_string(), value);
    }

    /// Drop `key` from every list
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        if let Some(list) = state.find(key) {
            state.unlink(key, list);
        }
        state.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().values.contains_key(key)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        let capacity = state.capacity;
        *state = ArcState::new(capacity);
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    fn evict(&self, state: &mut ArcState, hit_in_b2: bool) {
        if state.resident() >= state.capacity && state.replace(hit_in_b2) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn make_room_for_new(&self, state: &mut ArcState) {
        let capacity = state.capacity;
        let l1 = state.t1.len() + state.b1.len();

        if l1 >= capacity {
            if state.t1.len() < capacity {
                state.b1.pop_front();
                self.evict(state, false);
            } else if let Some(evicted) = state.t1.pop_front() {
                // B1 is empty; drop the T1 victim outright
                state.values.remove(&evicted);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        } else if state.resident() + state.ghosts() >= capacity {
            if state.resident() + state.ghosts() >= 2 * capacity {
                state.b2.pop_front();
            }
            self.evict(state, false);
        }
    }
}

impl CacheBackend for ArcCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        Self::get(self, key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.put(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        Self::remove(self, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_basic_put_get() {
        let cache = ArcCache::new(10);

        cache.put("b:k1:", b"value1".to_vec());
        cache.put("b:k2:", b"value2".to_vec());

        assert_eq!(cache.get("b:k1:"), Some(b"value1".to_vec()));
        assert_eq!(cache.get("b:k2:"), Some(b"value2".to_vec()));
        assert_eq!(cache.get("b:k3:"), None);
    }

    #[test]
    fn test_arc_overwrite() {
        let cache = ArcCache::new(4);
        cache.put("k", b"old".to_vec());
        cache.put("k", b"new".to_vec());
        assert_eq!(cache.get("k"), Some(b"new".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_arc_eviction() {
        let cache = ArcCache::new(3);

        cache.put("k1", b"v1".to_vec());
        cache.put("k2", b"v2".to_vec());
        cache.put("k3", b"v3".to_vec());
        assert_eq!(cache.len(), 3);

        cache.put("k4", b"v4".to_vec());

        assert!(cache.get("k1").is_none());
        assert_eq!(cache.get("k4"), Some(b"v4".to_vec()));
        assert!(cache.len() <= 3);
    }

    #[test]
    fn test_arc_frequent_entry_survives_scan() {
        let cache = ArcCache::new(4);
        cache.put("hot", b"h".to_vec());
        cache.get("hot");

        for i in 0..16 {
            cache.put(&format!("scan-{i}"), b"s".to_vec());
        }

        assert_eq!(cache.get("hot"), Some(b"h".to_vec()));
        assert!(cache.len() <= 4);
    }

    #[test]
    fn test_arc_readmit_after_eviction() {
        let cache = ArcCache::new(2);

        cache.put("k1", b"v1".to_vec());
        cache.put("k2", b"v2".to_vec());
        cache.put("k3", b"v3".to_vec());
        assert!(!cache.contains("k1"));

        cache.put("k1", b"v1_new".to_vec());
        assert_eq!(cache.get("k1"), Some(b"v1_new".to_vec()));
        assert!(cache.len() <= 2);
    }

    #[test]
    fn test_arc_remove_and_clear() {
        let cache = ArcCache::new(10);

        cache.put("k", b"value".to_vec());
        assert_eq!(cache.remove("k"), Some(b"value".to_vec()));
        assert!(!cache.contains("k"));

        cache.put("a", b"1".to_vec());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 10);
    }

    #[test]
    fn test_arc_stats() {
        let cache = ArcCache::new(10);
        cache.put("k", b"value".to_vec());

        cache.get("k");
        cache.get("missing");

        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
