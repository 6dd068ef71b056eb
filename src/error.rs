//! Error taxonomy shared by the fetch endpoint and the playback client.

use thiserror::Error;

/// All errors produced while fetching or playing back a transcript.
///
/// Server-detected variants are returned to the client as structured
/// responses; client-detected variants never cross the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeakbackError {
    #[error("security check failed")]
    SecurityCheckFailed,

    #[error("too many requests, slow down")]
    RateLimited,

    #[error("invalid item id")]
    InvalidItemId,

    #[error("item not found or not publicly readable")]
    ItemNotAccessible,

    #[error("no readable content found for this item")]
    EmptyContent,

    #[error("content retrieval failed: {0}")]
    ContentRetrievalError(String),

    #[error("no speech engine available on this client")]
    EngineUnsupported,

    #[error("speech engine failed during playback: {0}")]
    EngineError(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

impl SpeakbackError {
    /// HTTP status the fetch endpoint answers with for server-detected
    /// variants. Client-detected variants map to 500 if they ever reach
    /// the response path, which they should not.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SecurityCheckFailed => 403,
            Self::RateLimited => 429,
            Self::InvalidItemId | Self::EmptyContent => 400,
            Self::ItemNotAccessible => 404,
            _ => 500,
        }
    }

    /// Stable machine-readable code used in the JSON error payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SecurityCheckFailed => "security_check_failed",
            Self::RateLimited => "rate_limited",
            Self::InvalidItemId => "invalid_item_id",
            Self::ItemNotAccessible => "item_not_accessible",
            Self::EmptyContent => "empty_content",
            Self::ContentRetrievalError(_) => "content_retrieval_error",
            Self::EngineUnsupported => "engine_unsupported",
            Self::EngineError(_) => "engine_error",
            Self::NetworkError(_) => "network_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SpeakbackError>;
