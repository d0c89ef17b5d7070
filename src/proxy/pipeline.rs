//! Per-request pipeline handlers.
//!
//! Non-streaming flow: derive key → cache lookup → on miss, coalesced
//! upstream fetch (the owner writes successful results to the cache before
//! publishing) → respond with an `x-cache: HIT|MISS` marker. Streaming
//! requests skip fingerprinting and caching entirely and are proxied
//! byte-for-byte with no marker.
//!
//! The cache subsystem never fails a request: storage errors degrade to a
//! forced miss inside [`crate::cache::Cache`], and only upstream failures
//! surface to the caller.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::fingerprint;
use crate::proxy::server::AppState;
use crate::proxy::upstream::forwardable_headers;

/// Cache-status marker header injected into every non-streaming response.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// POST /v1/chat/completions and POST /v1/messages.
pub async fn completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let forward = forwardable_headers(&headers);

    // Streaming requests cannot be cached as a single value without
    // buffering the whole stream, which would defeat the latency benefit.
    if body
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return passthrough(&state, &body, forward).await;
    }

    let key = match fingerprint::derive_request(&body) {
        Ok(key) => key,
        Err(CacheError::InvalidRequest(msg)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response();
        }
        Err(e) => {
            warn!("fingerprinting failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if let Some(cached) = state.cache.get(&key) {
        debug!(key = %&key[..8], "cache hit");
        return annotated(StatusCode::OK, cached, "HIT");
    }

    debug!(key = %&key[..8], "cache miss, fetching upstream");
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let outcome = state
        .coalescer
        .execute(&key, {
            let cache = state.cache.clone();
            let upstream = Arc::clone(&state.upstream);
            let key = key.clone();
            let body = body.clone();
            async move {
                let resp = upstream.fetch(&body, &forward).await?;
                // The owner writes once, inside the coalesced section, so
                // waiters never duplicate the store write. Only successful
                // responses are cached.
                if resp.is_success() {
                    cache.set(&key, &resp.body, &model, None);
                }
                Ok(resp)
            }
        })
        .await;

    match outcome {
        Ok(resp) => annotated(
            StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY),
            resp.body,
            "MISS",
        ),
        Err(e) => annotated(
            StatusCode::BAD_GATEWAY,
            json!({ "error": e.to_string() }),
            "MISS",
        ),
    }
}

/// Forward a streaming request and relay the response bytes unmodified.
/// No fingerprint, no store write, no cache-status marker.
async fn passthrough(state: &AppState, body: &Value, forward: Vec<(String, String)>) -> Response {
    match state.upstream.fetch_stream(body, &forward).await {
        Ok(stream) => {
            let mut resp = Response::new(Body::from_stream(stream.body));
            *resp.status_mut() =
                StatusCode::from_u16(stream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            if let Some(ct) = stream
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                resp.headers_mut()
                    .insert(axum::http::header::CONTENT_TYPE, ct);
            }
            resp
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Build a JSON response carrying the cache-status marker.
fn annotated(status: StatusCode, body: Value, cache_status: &'static str) -> Response {
    let mut resp = (status, Json(body)).into_response();
    resp.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(cache_status),
    );
    resp
}

/// GET /cache/stats.
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.cache.stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /cache/clear.
pub async fn cache_clear(State(state): State<Arc<AppState>>) -> Response {
    match state.cache.clear(None) {
        Ok(removed) => {
            info!(removed, "cache cleared via admin endpoint");
            Json(json!({ "status": "cleared", "removed": removed })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /health — liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
