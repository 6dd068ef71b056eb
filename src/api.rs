//! HTTP fetch endpoint for transcripts.
//!
//! One POST route composes the abuse checks and the resolution pipeline:
//! security token → rate limiter → id validation → cache → item visibility
//! → resolver → cache fill. Errors come back as structured JSON with the
//! status codes from the endpoint contract, never as panics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::TranscriptCache;
use crate::content::{ContentStore, ItemStatus};
use crate::error::SpeakbackError;
use crate::rate_limit::{client_identity, RateLimiter};
use crate::resolver::{ResolveTranscript, EXTRACT_SENTINEL};
use crate::store::TransientStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ContentStore>,
    pub cache: Arc<TranscriptCache>,
    pub limiter: Arc<RateLimiter>,
    pub resolver: Arc<dyn ResolveTranscript>,
    /// Backing store for cache and limiter, held for status reporting.
    pub transient: Arc<dyn TransientStore>,
    pub security_token: Arc<String>,
}

// --- Request/Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptRequest {
    pub token: String,
    pub item_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub transcript: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
struct StatusResponse {
    cached_transcripts: usize,
    tracked_identities: usize,
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/transcript", post(handle_transcript))
        .with_state(state)
}

/// Bind and serve the API in the foreground.
pub async fn serve(state: ApiState, addr: &str) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Fetch endpoint listening on {addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cached_transcripts: state.transient.value_count(),
        tracked_identities: state.transient.counter_count(),
    })
}

async fn handle_transcript(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<TranscriptResponse>, (StatusCode, Json<ErrorResponse>)> {
    let identity = client_identity(&headers, Some(peer.ip()));

    match fetch_transcript(&state, &req, &identity) {
        Ok(transcript) => {
            info!(
                "Transcript for item {} ({} chars): \"{}\"",
                req.item_id,
                transcript.chars().count(),
                preview(&transcript),
            );
            Ok(Json(TranscriptResponse { transcript }))
        }
        Err(e) => {
            warn!("Transcript fetch for item {} rejected: {e}", req.item_id);
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Err((
                status,
                Json(ErrorResponse {
                    code: e.code().to_string(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// First eighty characters of a transcript for the request log, with an
/// ellipsis only when something was actually cut off.
fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        out.push_str("...");
    }
    out
}

/// Endpoint core, separated from the axum plumbing so tests can drive it
/// directly. Check order: token, rate limit, id shape — all before any
/// library or resolver work.
pub fn fetch_transcript(
    state: &ApiState,
    req: &TranscriptRequest,
    identity: &str,
) -> crate::error::Result<String> {
    if req.token != *state.security_token {
        return Err(SpeakbackError::SecurityCheckFailed);
    }

    if !state.limiter.allow(identity) {
        return Err(SpeakbackError::RateLimited);
    }

    if req.item_id <= 0 {
        return Err(SpeakbackError::InvalidItemId);
    }
    let item_id = req.item_id as u64;

    let Some(item) = state.store.get(item_id) else {
        return Err(SpeakbackError::ItemNotAccessible);
    };
    let modified = item.modified.timestamp();

    if let Some(cached) = state.cache.get(item_id, modified) {
        return Ok(cached);
    }

    if item.status != ItemStatus::Published {
        return Err(SpeakbackError::ItemNotAccessible);
    }

    let resolved = state.resolver.resolve(&item)?;

    // Nothing usable server-side: hand the client the extraction marker
    // instead of failing outright.
    let transcript = if resolved.is_empty() {
        EXTRACT_SENTINEL.to_string()
    } else {
        resolved
    };

    state.cache.put(item_id, modified, &transcript);
    Ok(transcript)
}
