use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Values keyed by resource id, each valid for a fixed TTL after insertion.
/// Writers call [`TtlCache::invalidate`] for every id they touch.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some((at, _)) => at.elapsed() < self.ttl,
            None => return None,
        };
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: &str, value: V) {
        self.entries.insert(key.to_string(), (Instant::now(), value));
    }

    pub fn invalidate(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(key, "cache entry invalidated");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
