//! Sliding-window rate limiting keyed by best-effort client identity.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::store::TransientStore;

/// Proxy-forwarded address headers, most trustworthy first.
const FORWARD_HEADERS: [&str; 5] = [
    "cf-connecting-ip",
    "true-client-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
];

pub struct RateLimiter {
    store: Arc<dyn TransientStore>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn TransientStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
        }
    }

    /// Record a request from `identity` and decide whether it may proceed.
    ///
    /// An empty identity means we could not attribute the request; those
    /// are always allowed rather than failing closed.
    pub fn allow(&self, identity: &str) -> bool {
        if identity.is_empty() {
            return true;
        }

        let count = self
            .store
            .incr_window(&format!("ratelimit:{identity}"), self.window);
        if count > self.max_requests {
            debug!("Rate limit exceeded for {identity}: {count} in window");
            false
        } else {
            true
        }
    }
}

/// Derive the client identity from forwarded-address headers, falling back
/// to the socket peer address. A comma-separated header uses only its first
/// entry; values that do not parse as an IP are skipped.
pub fn client_identity(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    for name in FORWARD_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let first = value.split(',').next().unwrap_or("").trim();
        if first.parse::<IpAddr>().is_ok() {
            return first.to_string();
        }
    }

    peer.map(|ip| ip.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryStore::new()),
            &RateLimitConfig {
                window_secs: 300,
                max_requests: max,
            },
        )
    }

    #[test]
    fn rejects_the_request_after_the_maximum() {
        let limiter = limiter(3);
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        // A different identity is unaffected.
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn unknown_identity_is_always_allowed() {
        let limiter = limiter(1);
        for _ in 0..10 {
            assert!(limiter.allow(""));
        }
    }

    #[test]
    fn identity_prefers_forwarded_headers_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let peer = Some("192.168.1.5".parse().unwrap());
        assert_eq!(client_identity(&headers, peer), "203.0.113.9");
    }

    #[test]
    fn identity_skips_malformed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let peer = Some("192.168.1.5".parse().unwrap());
        assert_eq!(client_identity(&headers, peer), "192.168.1.5");
    }

    #[test]
    fn identity_is_empty_without_headers_or_peer() {
        assert_eq!(client_identity(&HeaderMap::new(), None), "");
    }

    #[test]
    fn higher_priority_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
        assert_eq!(client_identity(&headers, None), "198.51.100.4");
    }
}
