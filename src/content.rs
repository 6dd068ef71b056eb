//! Content item model and library.
//!
//! Items are publishable units: a body, a bag of auxiliary meta fields, and
//! a last-modification timestamp. The library loads them from a JSON file
//! and serves lookups to the fetch endpoint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Publication state of an item. Only published items are readable over
/// the fetch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Published,
    Draft,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub status: ItemStatus,
    /// Last-modification time. Part of the cache key (as Unix seconds),
    /// so any edit implicitly invalidates cached transcripts.
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
    /// Auxiliary key-value fields (page-builder payloads, excerpts, ...).
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

/// Lookup seam between the fetch endpoint and whatever holds the items.
pub trait ContentStore: Send + Sync {
    fn get(&self, id: u64) -> Option<Item>;
}

/// In-process library backed by a JSON file.
pub struct ContentLibrary {
    items: RwLock<HashMap<u64, Item>>,
}

impl ContentLibrary {
    pub fn new(items: Vec<Item>) -> Self {
        let map = items.into_iter().map(|i| (i.id, i)).collect();
        Self {
            items: RwLock::new(map),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a library from a JSON array of items. Unparseable files yield
    /// an empty library rather than a startup failure.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read content library {}: {e}", path.display());
                return Self::empty();
            }
        };

        match serde_json::from_str::<Vec<Item>>(&contents) {
            Ok(items) => {
                info!("Loaded {} items from {}", items.len(), path.display());
                Self::new(items)
            }
            Err(e) => {
                warn!("Failed to parse content library {}: {e}", path.display());
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace an item. Used by tests to simulate edits.
    pub fn upsert(&self, item: Item) {
        if let Ok(mut map) = self.items.write() {
            map.insert(item.id, item);
        }
    }
}

impl ContentStore for ContentLibrary {
    fn get(&self, id: u64) -> Option<Item> {
        self.items.read().ok()?.get(&id).cloned()
    }
}
