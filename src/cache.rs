//! Time-bounded memoization of generation results
//!
//! Keyed by (diagram type, normalized query). Entries rely solely on TTL
//! expiry, checked lazily on read - there is no background sweep and no
//! size bound. Writes are last-write-wins with no locking beyond the map
//! mutex; entries are immutable snapshots, so a stale overwrite only
//! shortens freshness. Concurrent misses for the same key are not
//! deduplicated.
//!
//! The cache and its clock are injected dependencies so tests can drive
//! expiry deterministically.

use crate::types::{DiagramType, GenerationResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source for TTL decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Memoization of parsed generation results
pub trait ContentCache: Send + Sync {
    fn get(&self, diagram_type: DiagramType, query: &str) -> Option<GenerationResult>;
    fn put(&self, diagram_type: DiagramType, query: &str, result: GenerationResult);
}

struct CacheEntry {
    value: GenerationResult,
    expires_at: Instant,
}

/// TTL-bounded in-memory cache
pub struct TtlCache {
    entries: Mutex<HashMap<(DiagramType, String), CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }
}

impl ContentCache for TtlCache {
    fn get(&self, diagram_type: DiagramType, query: &str) -> Option<GenerationResult> {
        let key = (diagram_type, Self::normalize(query));
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(&key) {
            Some(entry) if self.clock.now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                // Lazy eviction on first read past expiry
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    fn put(&self, diagram_type: DiagramType, query: &str, result: GenerationResult) {
        let key = (diagram_type, Self::normalize(query));
        let entry = CacheEntry {
            value: result,
            expires_at: self.clock.now() + self.ttl,
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key, entry);
    }
}
