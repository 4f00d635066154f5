//! # Server Configuration
//!
//! Router assembly, shared state and the OpenAPI document.

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware,
    response::Json,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::audit::AuditSink;
use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::sources::ProviderSourceRegistry;
use crate::telemetry::trace_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub sources: Arc<ProviderSourceRegistry>,
    pub audit: Arc<dyn AuditSink>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/v1/admin/providers/{namespace}/{provider}/refresh",
            post(handlers::admin::refresh_provider),
        )
        .route(
            "/v1/admin/providers/{namespace}/{provider}/versions/{version}",
            delete(handlers::admin::delete_version),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The CLI never sends credentials, browsers only read
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/.well-known/terraform.json",
            get(handlers::registry::service_discovery),
        )
        .route(
            "/v1/providers/{namespace}/{provider}/versions",
            get(handlers::registry::list_versions),
        )
        .route(
            "/v1/providers/{namespace}/{provider}/{version}/download/{os}/{arch}",
            get(handlers::registry::download),
        )
        .route("/v2/provider-docs", get(handlers::docs::list_docs))
        .route("/v2/provider-docs/{id}", get(handlers::docs::get_doc))
        .route("/openapi.json", get(openapi_json))
        .merge(admin)
        .with_state(state)
        .layer(middleware::from_fn(trace_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
    sources: ProviderSourceRegistry,
    audit: Arc<dyn AuditSink>,
) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let state = AppState {
        db,
        config: Arc::new(config),
        sources: Arc::new(sources),
        audit,
    };
    tracing::info!(
        profile = %state.config.profile,
        sources = ?state.sources.names(),
        "Provider sources registered"
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::registry::service_discovery,
        crate::handlers::registry::list_versions,
        crate::handlers::registry::download,
        crate::handlers::docs::list_docs,
        crate::handlers::docs::get_doc,
        crate::handlers::admin::refresh_provider,
        crate::handlers::admin::delete_version,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::protocol::ServiceDiscovery,
            crate::protocol::VersionsResponse,
            crate::protocol::DownloadResponse,
            crate::protocol::DocListResponse,
            crate::protocol::DocDetailResponse,
            crate::extractor::RefreshReport,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Provider Registry API",
        description = "Provider registry protocol and release ingestion",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
