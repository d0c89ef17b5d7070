//! Axum server for the cache proxy.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::cache::Cache;
use crate::coalesce::Coalescer;
use crate::config::ServerConfig;
use crate::proxy::pipeline;
use crate::proxy::upstream::{UpstreamFetcher, UpstreamResponse};

/// Shared state for all proxy handlers.
pub struct AppState {
    /// Cache engine consulted before any upstream call.
    pub cache: Cache,
    /// In-flight registry collapsing concurrent identical misses.
    pub coalescer: Coalescer<UpstreamResponse>,
    /// Capability used to reach the upstream provider.
    pub upstream: Arc<dyn UpstreamFetcher>,
}

impl AppState {
    pub fn new(cache: Cache, upstream: Arc<dyn UpstreamFetcher>) -> Self {
        Self {
            cache,
            coalescer: Coalescer::new(),
            upstream,
        }
    }
}

/// Build the axum router with all proxy routes.
pub fn build_router(state: AppState) -> Router {
    // Wrap state in Arc once so handlers share it without a double-Arc.
    let shared_state = Arc::new(state);

    Router::new()
        // Inbound API surface — both provider paths feed one pipeline.
        .route("/v1/chat/completions", post(pipeline::completions))
        .route("/v1/messages", post(pipeline::completions))
        // Admin surface for the CLI and operators.
        .route("/cache/stats", get(pipeline::cache_stats))
        .route("/cache/clear", post(pipeline::cache_clear))
        .route("/health", get(pipeline::health))
        // Body size limit: 8 MiB. LLM requests with long context can be
        // large, but unbounded bodies are rejected cheaply up front.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the proxy server and serve until the process exits.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("cache proxy listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::error::Result;
    use crate::proxy::upstream::UpstreamStream;
    use crate::store::Store;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NullUpstream;

    #[async_trait]
    impl UpstreamFetcher for NullUpstream {
        async fn fetch(
            &self,
            _body: &Value,
            _headers: &[(String, String)],
        ) -> Result<UpstreamResponse> {
            Err(crate::error::CacheError::Upstream("unreachable".into()))
        }

        async fn fetch_stream(
            &self,
            _body: &Value,
            _headers: &[(String, String)],
        ) -> Result<UpstreamStream> {
            Err(crate::error::CacheError::Upstream("unreachable".into()))
        }
    }

    #[test]
    fn test_app_state_starts_with_empty_registry() {
        let cache = Cache::new(Store::open_in_memory().unwrap(), CachePolicy::default()).unwrap();
        let state = AppState::new(cache, Arc::new(NullUpstream));
        assert_eq!(state.coalescer.in_flight_count(), 0);
    }

    #[test]
    fn test_build_router() {
        let cache = Cache::new(Store::open_in_memory().unwrap(), CachePolicy::default()).unwrap();
        let state = AppState::new(cache, Arc::new(NullUpstream));
        let _router = build_router(state);
    }
}
