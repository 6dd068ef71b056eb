//! readaloud-rs: spoken playback for published content.
//!
//! Server side: an HTTP endpoint that resolves a content item to a plain
//! text transcript under rate limiting and timestamp-keyed caching.
//! Client side: a playback session state machine, voice selection, and a
//! rendered-page extraction fallback, all engine-agnostic behind traits.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod resolver;
pub mod session;
pub mod store;
pub mod voice;
