//! Transcript cache keyed by item identity and modification time.
//!
//! The modification timestamp is part of the key, so editing an item
//! invalidates its cached transcript implicitly. The TTL only bounds how
//! long dead keys linger.

use std::sync::Arc;
use std::time::Duration;

use crate::store::TransientStore;

pub struct TranscriptCache {
    store: Arc<dyn TransientStore>,
    ttl: Duration,
}

impl TranscriptCache {
    pub fn new(store: Arc<dyn TransientStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(item_id: u64, modified: i64) -> String {
        format!("transcript:{item_id}:{modified}")
    }

    pub fn get(&self, item_id: u64, modified: i64) -> Option<String> {
        self.store.get(&Self::key(item_id, modified))
    }

    pub fn put(&self, item_id: u64, modified: i64, transcript: &str) {
        self.store
            .put(&Self::key(item_id, modified), transcript.to_string(), self.ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> TranscriptCache {
        TranscriptCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600))
    }

    #[test]
    fn hit_requires_matching_id_and_timestamp() {
        let cache = cache();
        cache.put(42, 1000, "hello there");

        assert_eq!(cache.get(42, 1000).as_deref(), Some("hello there"));
        // Same item, newer edit: miss.
        assert_eq!(cache.get(42, 1001), None);
        assert_eq!(cache.get(43, 1000), None);
    }

    #[test]
    fn newer_edit_writes_a_fresh_entry_without_clobbering_the_old_key() {
        let cache = cache();
        cache.put(42, 1000, "old text");
        cache.put(42, 2000, "new text");

        assert_eq!(cache.get(42, 2000).as_deref(), Some("new text"));
        assert_eq!(cache.get(42, 1000).as_deref(), Some("old text"));
    }
}
