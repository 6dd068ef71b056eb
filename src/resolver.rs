//! Transcript resolution: turn an item into plain text fit for speech.
//!
//! Strategies run in a fixed order and their yields are concatenated — the
//! meta harvest supplements the body rather than replacing it:
//! 1. The item body, if non-trivially long once markup is stripped.
//! 2. Auxiliary meta fields with content-ish keys; serialized values are
//!    decoded and prose-like strings harvested recursively.
//!
//! The combined text is normalized (shortcodes and tags stripped, entities
//! decoded, whitespace collapsed) and passed through registered filters.
//! An empty result is not an error here: the endpoint prepends the
//! extraction sentinel so the client can fall back to the rendered page.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::content::Item;
use crate::error::Result;

/// Marker prefix telling the client to attempt local page extraction.
pub const EXTRACT_SENTINEL: &str = "[readaloud:extract]";

/// Meta keys worth scanning: generic content-ish names plus known
/// page-builder vendor payloads.
const META_KEY_PATTERNS: [&str; 9] = [
    "content",
    "text",
    "description",
    "body",
    "excerpt",
    "builder",
    "elementor",
    "panels",
    "fusion",
];

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[/?[a-zA-Z][^\]]*\]").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Post-normalization text transform (boilerplate removal and the like).
pub type TextFilter = Box<dyn Fn(String) -> String + Send + Sync>;

/// Seam between the fetch endpoint and the resolution pipeline; lets tests
/// count invocations without touching the endpoint code.
pub trait ResolveTranscript: Send + Sync {
    fn resolve(&self, item: &Item) -> Result<String>;
}

pub struct Resolver {
    config: ResolverConfig,
    filters: Vec<TextFilter>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
        }
    }

    /// Register a transform applied to the normalized transcript, in
    /// registration order.
    pub fn add_filter<F>(&mut self, filter: F)
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
    }
}

impl ResolveTranscript for Resolver {
    fn resolve(&self, item: &Item) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();

        for (name, strategy) in strategies() {
            if let Some(text) = strategy(item, &self.config) {
                debug!("Strategy {name} yielded {} chars for item {}", text.len(), item.id);
                parts.push(text);
            }
        }

        let mut text = normalize(&parts.join(" "));
        for filter in &self.filters {
            text = filter(text);
        }

        Ok(text.trim().to_string())
    }
}

type Strategy = fn(&Item, &ResolverConfig) -> Option<String>;

/// Ordered extraction strategies. New sources slot in here without
/// touching the existing ones.
fn strategies() -> [(&'static str, Strategy); 2] {
    [("body", body_strategy), ("meta", meta_strategy)]
}

/// Strategy 1: the item's stored body, if it still says something once
/// markup and shortcode syntax are gone.
fn body_strategy(item: &Item, config: &ResolverConfig) -> Option<String> {
    let stripped = normalize(&item.body);
    if stripped.chars().count() >= config.min_body_chars {
        Some(item.body.clone())
    } else {
        None
    }
}

/// Strategy 2: scan auxiliary meta fields whose keys look content-bearing
/// and whose raw value is long enough to be worth decoding.
fn meta_strategy(item: &Item, config: &ResolverConfig) -> Option<String> {
    let mut harvested: Vec<String> = Vec::new();

    // Deterministic scan order regardless of map iteration order.
    let mut keys: Vec<&String> = item.meta.keys().collect();
    keys.sort();

    for key in keys {
        let lowered = key.to_lowercase();
        if !META_KEY_PATTERNS.iter().any(|p| lowered.contains(p)) {
            continue;
        }
        let value = &item.meta[key];
        if value.chars().count() < config.min_meta_value_chars {
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(value) {
            Ok(decoded) => harvest_prose(&decoded, config.min_prose_chars, &mut harvested),
            // Not a serialized structure: treat the raw value as candidate
            // prose.
            Err(_) => {
                if looks_like_prose(value, config.min_prose_chars) {
                    harvested.push(value.clone());
                }
            }
        }
    }

    if harvested.is_empty() {
        None
    } else {
        Some(harvested.join(" "))
    }
}

/// Walk a decoded structure and keep the strings that read like prose
/// rather than configuration data.
fn harvest_prose(value: &serde_json::Value, min_chars: usize, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if looks_like_prose(s, min_chars) {
                out.push(s.clone());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                harvest_prose(item, min_chars, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                harvest_prose(item, min_chars, out);
            }
        }
        _ => {}
    }
}

/// Prose heuristic: long enough, contains word breaks, and dominated by
/// letters and spaces rather than structural characters.
fn looks_like_prose(text: &str, min_chars: usize) -> bool {
    let stripped = normalize(text);
    let total = stripped.chars().count();
    if total < min_chars || !stripped.contains(' ') {
        return false;
    }
    let wordy = stripped
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .count();
    wordy * 100 >= total * 80
}

/// Strip shortcode and tag syntax, decode entities, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let text = SHORTCODE_RE.replace_all(text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Decode the entity escapes that show up in stored content. Unknown
/// entities pass through verbatim.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';').filter(|&e| e <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };

        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            "hellip" => Some('…'),
            "mdash" => Some('—'),
            "ndash" => Some('–'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
