//! Short-lived read cache
//!
//! Entries expire after a fixed TTL measured on an injected [`Clock`], and the
//! whole cache is cleared whenever the unified view is rebuilt.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.start + offset
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// TTL-bounded map from query key to result
pub struct QueryCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Fresh value for `key`; an expired entry is evicted
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = match entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.ttl,
            None => return None,
        };
        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, CacheEntry { value, stored_at });
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(clock: &ManualClock) -> QueryCache<&'static str, Arc<Vec<u32>>> {
        QueryCache::new(Duration::from_secs(300), Arc::new(clock.clone()))
    }

    #[test]
    fn test_hit_within_ttl_returns_same_value() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        let value = Arc::new(vec![1, 2, 3]);
        cache.insert("k", value.clone());

        clock.advance(Duration::from_secs(299));
        let hit = cache.get(&"k").unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
    }

    #[test]
    fn test_expires_at_ttl() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        cache.insert("k", Arc::new(vec![1]));

        clock.advance(Duration::from_secs(300));
        assert!(cache.get(&"k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let clock = ManualClock::new();
        let cache = cache(&clock);
        cache.insert("a", Arc::new(vec![]));
        cache.insert("b", Arc::new(vec![]));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.get(&"a").is_none());
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = clock.now();
        other.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - before, Duration::from_secs(5));
    }
}
