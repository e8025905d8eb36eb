//! HTTP API tests driven through the router with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use semantic_cache_tier::cache::exact::InMemoryExactStore;
use semantic_cache_tier::cache::semantic::InMemorySemanticStore;
use semantic_cache_tier::config::Config;
use semantic_cache_tier::server::api::{build_router, AppState};

use common::*;

fn app() -> Router {
    app_with(config(1000, 0.60), ScriptedGenerator::new())
}

fn app_with(config: Config, generator: ScriptedGenerator) -> Router {
    let embedder = Arc::new(
        KeyedEmbedder::new()
            .with("What is ML?", axis(0))
            .with("what is machine learning", at_similarity(0.75)),
    );
    let cache = build_cache(
        &config,
        Arc::new(InMemoryExactStore::new()),
        Arc::new(InMemorySemanticStore::new()),
        embedder,
        Arc::new(generator.with(
            "What is ML?",
            "Machine learning is a subset of AI focused on learning from data.",
        )),
    );

    build_router(Arc::new(AppState {
        cache: Arc::new(cache),
        config: Arc::new(config),
        start_time: Instant::now(),
    }))
}

async fn post_prompt(app: &Router, uri: &str, prompt: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "prompt": prompt }).to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_process_prompt_miss_then_hits() {
    let app = app();

    let (status, miss) = post_prompt(&app, "/process-prompt", "What is ML?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(miss["from_cache"], false);
    assert!(miss["cache_tier"].is_null());
    assert!(miss.get("similarity").is_none());
    assert!(miss["latency"].as_f64().unwrap() >= 0.0);

    let (_, semantic) = post_prompt(&app, "/process-prompt/", "what is machine learning").await;
    assert_eq!(semantic["from_cache"], true);
    assert_eq!(semantic["cache_tier"], 2);
    assert_eq!(semantic["response"], miss["response"]);
    assert!((semantic["similarity"].as_f64().unwrap() - 0.75).abs() < 1e-3);

    let (_, exact) = post_prompt(&app, "/process-prompt", "what is machine learning").await;
    assert_eq!(exact["cache_tier"], 1);
    assert_eq!(exact["similarity"], 1.0);
}

#[tokio::test]
async fn test_process_prompt_rejects_missing_field() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/process-prompt")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"text": "hello"}"#))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    post_prompt(&app, "/process-prompt", "What is ML?").await;
    post_prompt(&app, "/process-prompt", "What is ML?").await;

    let (status, metrics) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total_requests"], 2);
    assert_eq!(metrics["cache_hits"], 1);
    assert_eq!(metrics["cache_misses"], 1);
    assert!(metrics["total_latency_saved"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_prometheus_endpoint() {
    let app = app();
    post_prompt(&app, "/process-prompt", "What is ML?").await;

    let request = Request::builder()
        .uri("/metrics/prometheus")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("semantic_cache_total_requests 1"));
    assert!(text.contains("semantic_cache_cache_misses 1"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app();
    post_prompt(&app, "/process-prompt", "What is ML?").await;

    let (status, health) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["semantic_entries"], 1);
    assert_eq!(health["semantic_capacity"], 1000);
    assert_eq!(health["similarity_threshold"], 0.6);
}

#[tokio::test]
async fn test_request_timeout_is_counted() {
    let mut config = config(1000, 0.60);
    config.server.request_timeout_secs = 1;
    let app = app_with(config, ScriptedGenerator::new().with_delay(Duration::from_secs(3)));

    let (status, _) = post_prompt(&app, "/process-prompt", "slow prompt").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let (_, metrics) = get(&app, "/metrics").await;
    assert_eq!(metrics["total_requests"], 1);
    assert_eq!(metrics["cache_misses"], 1);
    assert_eq!(metrics["cache_hits"], 0);
}
