//! Transcript fetch client.
//!
//! The page-side half of the endpoint protocol: posts the token and item
//! id, and maps transport faults, malformed payloads, and structured error
//! responses onto the shared error taxonomy.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::api::{ErrorResponse, TranscriptRequest, TranscriptResponse};
use crate::error::{Result, SpeakbackError};
use crate::resolver::EXTRACT_SENTINEL;

/// A successfully fetched transcript, or the server's signal that the
/// client must extract text from the rendered page itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedTranscript {
    Resolved(String),
    NeedsExtraction,
}

pub struct TranscriptFetcher {
    client: Client,
    endpoint: String,
    token: String,
}

impl TranscriptFetcher {
    pub fn new(endpoint: &str, token: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(500))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn fetch(&self, item_id: u64) -> Result<FetchedTranscript> {
        // Ids past i64::MAX would wrap negative on the wire; reject them
        // here instead of bouncing them off the server.
        let item_id = i64::try_from(item_id).map_err(|_| SpeakbackError::InvalidItemId)?;
        let request = TranscriptRequest {
            token: self.token.clone(),
            item_id,
        };

        let response = self
            .client
            .post(format!("{}/transcript", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeakbackError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpeakbackError::NetworkError(e.to_string()))?;

        if status.is_success() {
            let payload: TranscriptResponse = serde_json::from_str(&body)
                .map_err(|_| SpeakbackError::NetworkError("malformed payload".into()))?;
            debug!("Fetched {} chars for item {item_id}", payload.transcript.len());
            Ok(classify_transcript(&payload.transcript))
        } else {
            Err(error_from_response(status.as_u16(), &body))
        }
    }
}

/// Detect the extraction sentinel on an otherwise successful response.
pub fn classify_transcript(transcript: &str) -> FetchedTranscript {
    match transcript.strip_prefix(EXTRACT_SENTINEL) {
        Some(_) => FetchedTranscript::NeedsExtraction,
        None => FetchedTranscript::Resolved(transcript.to_string()),
    }
}

/// Map a structured error response (or a bare status, when the body does
/// not parse) back onto the taxonomy.
fn error_from_response(status: u16, body: &str) -> SpeakbackError {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        let error = match parsed.code.as_str() {
            "security_check_failed" => SpeakbackError::SecurityCheckFailed,
            "rate_limited" => SpeakbackError::RateLimited,
            "invalid_item_id" => SpeakbackError::InvalidItemId,
            "item_not_accessible" => SpeakbackError::ItemNotAccessible,
            "empty_content" => SpeakbackError::EmptyContent,
            "content_retrieval_error" => SpeakbackError::ContentRetrievalError(parsed.message),
            _ => SpeakbackError::NetworkError(format!("unknown error code: {}", parsed.code)),
        };
        return error;
    }

    match status {
        403 => SpeakbackError::SecurityCheckFailed,
        429 => SpeakbackError::RateLimited,
        404 => SpeakbackError::ItemNotAccessible,
        400 => SpeakbackError::InvalidItemId,
        _ => SpeakbackError::NetworkError(format!("unexpected status {status}")),
    }
}
