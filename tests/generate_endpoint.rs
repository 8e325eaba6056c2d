//! Integration tests for the HTTP surface
//!
//! Builds the real Axum router with a scripted executor behind the
//! pipeline, so the full request path (middleware, validation, pipeline,
//! serialization) is exercised without a provider.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
};
use sketchmind::cache::{ContentCache, TtlCache};
use sketchmind::config::Config;
use sketchmind::error::AppResult;
use sketchmind::handlers::{self, AppState};
use sketchmind::metrics::Metrics;
use sketchmind::middleware::request_id_middleware;
use sketchmind::provider::LlmExecutor;
use sketchmind::router::ModelChoice;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Executor fake that always answers the unified call with a complete
/// package
struct UnifiedExecutor;

#[async_trait]
impl LlmExecutor for UnifiedExecutor {
    async fn execute(
        &self,
        _choice: &ModelChoice,
        _system_prompt: &str,
        _user_message: &str,
        _stage: &'static str,
    ) -> AppResult<String> {
        Ok(r#"{
            "diagram_type": "radial_mindmap",
            "topic": "The Roman Empire",
            "universal": "The Roman Empire was the post-republican period of ancient Rome.",
            "facts": [
                {"text": "Founded in 27 BC", "theme": "history", "keywords": ["founding"]},
                {"text": "Fell in 476 AD", "theme": "history", "keywords": ["fall"]}
            ],
            "diagram": "mindmap\n  root((The Roman Empire))\n    Founded in 27 BC\n    Fell in 476 AD"
        }"#
        .to_string())
    }
}

fn test_config() -> Arc<Config> {
    let toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[provider]
base_url = "http://localhost:9999/v1"
api_key_env = "TEST_API_KEY"

[models.fast]
id = "mini"
protocol = "chat"

[models.deep]
id = "large"
protocol = "responses"
"#;
    Arc::new(toml::from_str(toml).expect("test config should parse"))
}

fn test_app(executor: Arc<dyn LlmExecutor>) -> Router {
    let cache: Arc<dyn ContentCache> = Arc::new(TtlCache::new(Duration::from_secs(120)));
    let metrics = Metrics::new().expect("metrics should register");
    let state = AppState::with_parts(test_config(), executor, cache, metrics);

    Router::new()
        .route("/generate", post(handlers::generate::handler))
        .route("/health", get(handlers::health::handler))
        .route("/metrics", get(handlers::metrics::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn generate_returns_complete_artifact_set() {
    let app = test_app(Arc::new(UnifiedExecutor));
    let response = app
        .oneshot(
            Request::post("/generate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "the Roman Empire"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "response must carry a request id"
    );

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["diagram_type"], "radial_mindmap");
    assert!(body["structured_content"]
        .as_str()
        .unwrap()
        .starts_with("Topic: The Roman Empire"));
    assert!(body["diagram_source"].as_str().unwrap().starts_with("mindmap"));
    assert!(!body["universal_content"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn empty_query_is_structured_400() {
    let app = test_app(Arc::new(UnifiedExecutor));
    let response = app
        .oneshot(
            Request::post("/generate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "validation");
    assert!(body["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn pipeline_failure_is_structured_500() {
    struct AlwaysTimeout;

    #[async_trait]
    impl LlmExecutor for AlwaysTimeout {
        async fn execute(
            &self,
            _choice: &ModelChoice,
            _system_prompt: &str,
            _user_message: &str,
            stage: &'static str,
        ) -> AppResult<String> {
            Err(sketchmind::error::AppError::Timeout {
                stage,
                timeout_seconds: 45,
            })
        }
    }

    let app = test_app(Arc::new(AlwaysTimeout));
    let response = app
        .oneshot(
            Request::post("/generate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "anything at all"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "timeout");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = test_app(Arc::new(UnifiedExecutor));
    let response = app
        .oneshot(
            Request::post("/generate")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let app = test_app(Arc::new(UnifiedExecutor));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn metrics_endpoint_exposes_generation_counters() {
    let app = test_app(Arc::new(UnifiedExecutor));

    // One successful generation first so the counters exist
    let response = app
        .clone()
        .oneshot(
            Request::post("/generate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "the Roman Empire"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("sketchmind_generations_total"), "got: {}", text);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    // Second identical request with an explicit type hint must not call
    // the executor again
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExecutor(Arc<AtomicUsize>);

    #[async_trait]
    impl LlmExecutor for CountingExecutor {
        async fn execute(
            &self,
            choice: &ModelChoice,
            system_prompt: &str,
            user_message: &str,
            stage: &'static str,
        ) -> AppResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            UnifiedExecutor
                .execute(choice, system_prompt, user_message, stage)
                .await
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let app = test_app(Arc::new(CountingExecutor(calls.clone())));

    let request = || {
        Request::post("/generate")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"query": "the Roman Empire", "diagram_type": "radial_mindmap"}"#,
            ))
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "second request must be a cache hit"
    );
}
