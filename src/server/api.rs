//! HTTP API.
//!
//! - POST /process-prompt
//! - GET /metrics (JSON counters)
//! - GET /metrics/prometheus
//! - GET /health

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::orchestrator::{CacheResponse, TieredCache};
use crate::config::Config;
use crate::metrics::MetricsSnapshot;

/// Application state shared across handlers.
pub struct AppState {
    pub cache: Arc<TieredCache>,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process-prompt", post(process_prompt))
        .route("/process-prompt/", post(process_prompt))
        .route("/metrics", get(metrics))
        .route("/metrics/", get(metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PromptResponse {
    pub response: String,
    pub from_cache: bool,
    /// 1 = exact match, 2 = semantic, null = generated.
    pub cache_tier: Option<u8>,
    /// Seconds.
    pub latency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl From<CacheResponse> for PromptResponse {
    fn from(r: CacheResponse) -> Self {
        Self {
            response: r.response,
            from_cache: r.from_cache,
            cache_tier: r.tier.map(|t| t.level()),
            latency: r.latency,
            similarity: r.similarity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// `None` when the semantic store could not be queried.
    pub semantic_entries: Option<usize>,
    pub semantic_capacity: usize,
    pub similarity_threshold: f64,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn process_prompt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, StatusCode> {
    let request_id = Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        prompt_chars = req.prompt.chars().count(),
        "Prompt request"
    );

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    match tokio::time::timeout(timeout, state.cache.handle(&req.prompt)).await {
        Ok(result) => {
            info!(
                request_id = %request_id,
                from_cache = result.from_cache,
                tier = result.tier.map(|t| t.level()),
                latency = result.latency,
                "Prompt served"
            );
            Ok(Json(result.into()))
        }
        Err(_) => {
            // The dropped `handle` future never reached its own accounting.
            state.cache.metrics().record_miss();
            warn!(request_id = %request_id, ?timeout, "Prompt request timed out");
            Err(StatusCode::GATEWAY_TIMEOUT)
        }
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.cache.metrics().snapshot())
}

async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.cache.metrics().encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let tier = state.cache.semantic_tier();
    let semantic_entries = match tier.count().await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Semantic store count failed: {e}");
            None
        }
    };

    Json(HealthResponse {
        status: if semantic_entries.is_some() { "ok" } else { "degraded" }.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        semantic_entries,
        semantic_capacity: tier.max_size(),
        similarity_threshold: tier.threshold(),
    })
}
