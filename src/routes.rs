//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod manifest;
mod sync;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Sync jobs
        .route("/api/sync", get(sync::list_jobs).post(sync::start_sync))
        .route(
            "/api/sync/{job_id}",
            get(sync::get_job).delete(sync::cancel_job),
        )
        // Published manifest
        .route("/api/manifest", get(manifest::get_manifest))
        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::rpc::{ChainFixture, InMemoryChain};
    use crate::state::AppState;
    use crate::storage::InMemoryStorage;
    use crate::sync::serializer::MANIFEST_FILENAME;
    use crate::sync::SyncOptions;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADDRESS: &str = "By2sVGZXwfQq6rAiAM3rNPJ9iQfb5e2QhnF4YjJ4Bip";

    fn app() -> (Router, Arc<InMemoryStorage>, SharedState) {
        let storage = Arc::new(InMemoryStorage::new("storage.test"));
        let state = Arc::new(AppState::new(
            Arc::new(InMemoryChain::new(ChainFixture::default())),
            storage.clone(),
            SyncOptions::default(),
        ));
        (
            create_router(state.clone(), &Settings::default()),
            storage,
            state,
        )
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_sync(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/sync")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_start_sync_validates_body() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_sync(r#"{"governanceAddress":"nope","name":"DAO"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_started_job_is_queryable() {
        let (app, _, state) = app();
        let body = format!(r#"{{"governanceAddress":"{}","name":"DAO"}}"#, ADDRESS);
        let response = app.clone().oneshot(post_sync(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let job_id = json(response).await["data"]["jobId"]
            .as_str()
            .unwrap()
            .to_string();
        let uuid = job_id.parse().unwrap();

        // the realm does not exist in the empty chain
        for _ in 0..100 {
            if state.jobs.get(uuid).await.unwrap().finished_at.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let response = app
            .oneshot(
                Request::get(format!("/api/sync/{}", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["status"], "failed");
        assert_eq!(body["data"]["errorCode"], "REALM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (app, _, _) = app();
        let response = app
            .oneshot(
                Request::delete(format!("/api/sync/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_manifest_endpoint() {
        let (app, storage, state) = app();
        let response = app
            .clone()
            .oneshot(Request::get("/api/manifest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = state.codec.compress("[]").unwrap();
        storage
            .put(&state.options.pool, MANIFEST_FILENAME, bytes)
            .await;
        let response = app
            .oneshot(Request::get("/api/manifest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["data"], serde_json::json!([]));
    }
}
