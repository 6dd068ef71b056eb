//! Configuration management for readaloud-rs.
//!
//! Loads config from YAML files in standard locations; every section has
//! defaults so a missing or partial file still yields a working service.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// One-time security token expected on every fetch request.
    pub security_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8950,
            security_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window length in seconds.
    pub window_secs: u64,
    /// Maximum requests per identity per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            max_requests: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Transcript time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum stripped body length before the body alone counts as usable.
    pub min_body_chars: usize,
    /// Minimum raw meta value length before a field is worth scanning.
    pub min_meta_value_chars: usize,
    /// Minimum length for a harvested string to count as prose.
    pub min_prose_chars: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_body_chars: 20,
            min_meta_value_chars: 50,
            min_prose_chars: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Fallback language when neither the page nor the client declares one.
    pub fallback_language: String,
    /// Localized trigger labels handed to the client at page load.
    pub labels: LabelConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            fallback_language: "en".into(),
            labels: LabelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub loading: String,
    pub pause: String,
    pub resume: String,
    pub error: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            loading: "Loading…".into(),
            pause: "Pause".into(),
            resume: "Resume".into(),
            error: "Playback failed".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Path to the JSON content library file.
    pub library_path: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            library_path: "content.json".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub speech: SpeechConfig,
    pub content: ContentConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./readaloud.yaml
    /// 2. ~/.config/readaloud/config.yaml
    /// 3. /etc/readaloud/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("readaloud.yaml")),
                dirs::home_dir().map(|h| h.join(".config/readaloud/config.yaml")),
                Some(PathBuf::from("/etc/readaloud/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_missing_sections_with_defaults() {
        let yaml = "rate_limit:\n  max_requests: 5\n";
        let config: Config = serde_yml::from_str(yaml).expect("parse partial config");
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 300);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.speech.fallback_language, "en");
    }
}
