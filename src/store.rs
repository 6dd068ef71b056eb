//! Transient key-value storage.
//!
//! The cache and the rate limiter both run on this minimal interface so an
//! in-process map can later be swapped for a shared store without touching
//! the callers. Operations are best-effort: a lost update under concurrent
//! writes is acceptable for both users.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait TransientStore: Send + Sync {
    /// Fetch a value, treating expired entries as absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a time-to-live.
    fn put(&self, key: &str, value: String, ttl: Duration);

    /// Increment a windowed counter and return the count after the
    /// increment. The counter resets to 1 whenever `window` has elapsed
    /// since it was last reset.
    fn incr_window(&self, key: &str, window: Duration) -> u32;

    /// Live value count, for status reporting.
    fn value_count(&self) -> usize {
        0
    }

    /// Tracked counter identities, for status reporting.
    fn counter_count(&self) -> usize {
        0
    }
}

struct ValueEntry {
    value: String,
    expires: Instant,
}

struct CounterEntry {
    count: u32,
    window_start: Instant,
}

/// In-process implementation over mutex-guarded maps.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, ValueEntry>>,
    counters: Mutex<HashMap<String, CounterEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) values. Reported by the status
    /// endpoint.
    pub fn value_count(&self) -> usize {
        let now = Instant::now();
        self.values
            .lock()
            .map(|m| m.values().filter(|e| e.expires > now).count())
            .unwrap_or(0)
    }

    /// Number of tracked counter identities.
    pub fn counter_count(&self) -> usize {
        self.counters.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut map = self.values.lock().ok()?;
        match map.get(key) {
            Some(entry) if entry.expires > now => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    fn put_at(&self, key: &str, value: String, ttl: Duration, now: Instant) {
        if let Ok(mut map) = self.values.lock() {
            // Opportunistic sweep: dead keys (an edited item's old cache
            // entry) are never read again, so a `get` would not reclaim
            // them.
            map.retain(|_, e| e.expires > now);
            map.insert(
                key.to_string(),
                ValueEntry {
                    value,
                    expires: now + ttl,
                },
            );
        }
    }

    fn incr_window_at(&self, key: &str, window: Duration, now: Instant) -> u32 {
        let Ok(mut map) = self.counters.lock() else {
            return 1;
        };
        // Sweep counters whose window has elapsed. Identities come from
        // spoofable headers, so without this the map grows one entry per
        // forged identity for the process lifetime.
        map.retain(|_, e| now.duration_since(e.window_start) < window);
        // A swept key re-enters here with a fresh window, which is the
        // reset-to-1 behaviour the window contract asks for.
        let entry = map.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            window_start: now,
        });
        entry.count += 1;
        entry.count
    }
}

impl TransientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        self.put_at(key, value, ttl, Instant::now());
    }

    fn incr_window(&self, key: &str, window: Duration) -> u32 {
        self.incr_window_at(key, window, Instant::now())
    }

    fn value_count(&self) -> usize {
        MemoryStore::value_count(self)
    }

    fn counter_count(&self) -> usize {
        MemoryStore::counter_count(self)
    }
}
