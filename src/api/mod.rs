//! HTTP routing layer.
//!
//! Thin axum handlers over the [`Orchestrator`]. Handlers never wait on a
//! generation except for the uncached checklist.

mod error;
mod fallback;
mod manuals;
mod source;
mod steps;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

pub use error::ApiError;
pub use source::SourceLocator;

use crate::config::Config;
use crate::generation::Orchestrator;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub source: SourceLocator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, source: SourceLocator) -> Self {
        Self {
            orchestrator,
            source,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let step_routes = Router::new()
        .route("/explanation", get(steps::explanation))
        .route("/explanation/status", get(steps::explanation_status))
        .route("/orientation", get(steps::orientation))
        .route("/image", get(steps::image))
        .route("/checklist", get(steps::checklist));

    Router::new()
        .route("/health", get(health))
        .route("/api/manuals", get(manuals::list))
        .route(
            "/api/manuals/:manual_id",
            get(manuals::get).delete(manuals::delete),
        )
        .route("/api/manuals/:manual_id/steps", get(manuals::steps))
        .nest("/api/manuals/:manual_id/steps/:step", step_routes)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Empty or `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        info!("CORS: allowing all origins");
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    info!("CORS: allowing origins {:?}", origins);
    cors.allow_origin(allowed)
}

/// Serve until Ctrl+C.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state, &config.cors_origins);
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("📡 Listening on: {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::Notify;
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::generation::{CacheStore, Field, GenerationKey, PoolConfig};
    use crate::generator::fake::FakeGenerator;
    use crate::generator::GenerationKind;

    fn app(backend: Arc<MemoryStore>, generator: Arc<FakeGenerator>) -> (Router, Orchestrator) {
        let orchestrator = Orchestrator::new(CacheStore::new(backend), generator, PoolConfig::default());
        let source = SourceLocator::new(
            PathBuf::from("/nonexistent"),
            Url::parse("http://localhost:4000").unwrap(),
        );
        let state = AppState::new(orchestrator.clone(), source);
        (router(state, &[]), orchestrator)
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(Arc::new(MemoryStore::new()), Arc::new(FakeGenerator::new()));
        let (status, body) = call(&app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_explanation_pending_then_ready() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(
            FakeGenerator::gated(gate.clone())
                .answer(GenerationKind::Description, "Insert panel 02 into slot A")
                .answer(GenerationKind::ToolList, r#"{"tools": ["Allen Wrench (A13)"]}"#),
        );
        let (app, orchestrator) = app(Arc::new(MemoryStore::with_steps(1, &[2])), generator.clone());
        let uri = "/api/manuals/1/steps/2/explanation";

        let (status, body) = call(&app, "GET", uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert!(body["description"].as_str().unwrap().starts_with("Take the panel labeled 01"));
        assert_eq!(body["tools"], json!(["Allen Wrench (A13)"]));

        // Polling again while in flight starts nothing new
        call(&app, "GET", uri).await;
        let (_, poll) = call(&app, "GET", "/api/manuals/1/steps/2/explanation/status").await;
        assert_eq!(poll["status"], "pending");

        for field in [Field::Description, Field::Tools] {
            let key = GenerationKey::new(1, 2, field);
            while orchestrator.registry().contains(&key) {
                gate.notify_one();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        assert_eq!(generator.calls(), 2);

        let (_, body) = call(&app, "GET", uri).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["description"], "Insert panel 02 into slot A");

        let (_, poll) = call(&app, "GET", "/api/manuals/1/steps/2/explanation/status").await;
        assert_eq!(poll["status"], "ready");
        assert_eq!(poll["tools"], json!(["Allen Wrench (A13)"]));
    }

    #[tokio::test]
    async fn test_unknown_step_is_not_found() {
        let generator = Arc::new(FakeGenerator::new());
        let (app, _) = app(Arc::new(MemoryStore::with_steps(1, &[1])), generator.clone());

        for path in ["explanation", "explanation/status", "orientation", "image", "checklist"] {
            let (status, _) = call(&app, "GET", &format!("/api/manuals/1/steps/9/{path}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        }
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_orientation_of_last_step_is_default() {
        let generator = Arc::new(FakeGenerator::new());
        let (app, _) = app(Arc::new(MemoryStore::with_steps(1, &[1, 2])), generator.clone());

        let (status, body) = call(&app, "GET", "/api/manuals/1/steps/2/orientation").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ready", "show_popup": false, "message": "" }));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_orientation_at_highest_step_number() {
        let generator = Arc::new(FakeGenerator::new());
        let (app, _) = app(Arc::new(MemoryStore::with_steps(1, &[i32::MAX])), generator.clone());

        let uri = format!("/api/manuals/1/steps/{}/orientation", i32::MAX);
        let (status, body) = call(&app, "GET", &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["show_popup"], false);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_colorized_image_falls_back_to_plain() {
        let generator = Arc::new(FakeGenerator::gated(Arc::new(Notify::new())));
        let (app, _) = app(Arc::new(MemoryStore::with_steps(1, &[1])), generator);

        let (_, plain) = call(&app, "GET", "/api/manuals/1/steps/1/image").await;
        assert_eq!(plain["status"], "ready");

        let (_, colorized) = call(&app, "GET", "/api/manuals/1/steps/1/image?colorized=true").await;
        assert_eq!(colorized["status"], "pending");
        assert_eq!(colorized["url"], plain["url"]);
    }

    #[tokio::test]
    async fn test_manual_catalog() {
        let backend = Arc::new(MemoryStore::with_steps(3, &[2, 1]));
        let (app, _) = app(backend, Arc::new(FakeGenerator::new()));

        let (_, manuals) = call(&app, "GET", "/api/manuals").await;
        assert_eq!(manuals, json!([{ "id": 3, "name": "Manual 3", "slug": "manual-3" }]));

        let (_, steps) = call(&app, "GET", "/api/manuals/3/steps").await;
        assert_eq!(steps[0]["step_number"], 1);
        assert_eq!(steps[1]["step_number"], 2);

        let (status, _) = call(&app, "GET", "/api/manuals/4").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "DELETE", "/api/manuals/3").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", "/api/manuals/3/steps").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
