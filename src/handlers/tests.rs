//! # Tests for Handlers
//!
//! Router-level tests against an empty in-memory database.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use tower::ServiceExt;

use crate::audit::MemoryAuditSink;
use crate::config::AppConfig;
use crate::handlers::root;
use crate::server::{AppState, create_app};
use crate::sources::ProviderSourceRegistry;

async fn test_app() -> Router {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    crate::db::run_migrations(&db).await.unwrap();

    let config = AppConfig {
        public_url: "https://registry.example.com".to_string(),
        operator_tokens: vec!["operator-secret".to_string()],
        ..AppConfig::default()
    };
    create_app(AppState {
        db,
        config: Arc::new(config),
        sources: Arc::new(ProviderSourceRegistry::new()),
        audit: Arc::new(MemoryAuditSink::default()),
    })
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let response = root().await;
    let service_info = response.0;

    assert_eq!(service_info.service, "provider-registry");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_service_discovery_uses_public_url() {
    let (status, body) = get(test_app().await, "/.well-known/terraform.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["providers.v1"],
        "https://registry.example.com/v1/providers/"
    );
}

#[tokio::test]
async fn test_unknown_provider_versions_is_not_found() {
    let (status, body) = get(test_app().await, "/v1/providers/acme/missing/versions").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_download_rejects_unknown_operating_system() {
    let (status, body) = get(
        test_app().await,
        "/v1/providers/acme/missing/1.0.0/download/plan9/amd64",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["details"]["os"].as_str().unwrap().contains("plan9"));
}

#[tokio::test]
async fn test_download_rejects_unknown_architecture() {
    let (status, body) = get(
        test_app().await,
        "/v1/providers/acme/missing/1.0.0/download/linux/sparc",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["arch"].is_string());
}

#[tokio::test]
async fn test_docs_listing_requires_provider_version_filter() {
    let (status, body) = get(test_app().await, "/v2/provider-docs").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (status, body) = get(test_app().await, "/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Provider Registry API");
    assert!(body["paths"]["/.well-known/terraform.json"].is_object());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let response = test_app()
        .await
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "req-from-client")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-from-client"
    );
}

#[tokio::test]
async fn test_request_id_is_generated_when_absent() {
    let response = test_app()
        .await
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let trace_id = response.headers().get("x-request-id").unwrap();
    assert!(trace_id.to_str().unwrap().starts_with("req-"));
}

#[tokio::test]
async fn test_admin_routes_require_operator_token() {
    let response = test_app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/admin/providers/acme/missing/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
