//! # Operator Handlers
//!
//! Refresh and version deletion. Every route here sits behind
//! [`crate::auth::auth_middleware`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::registry::find_provider;
use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::extractor::{self, RefreshReport};
use crate::server::AppState;

/// Actor recorded in audit events for operator requests.
pub const OPERATOR_ACTOR: &str = "operator";

/// Discovers and imports new upstream releases of a provider
#[utoipa::path(
    post,
    path = "/v1/admin/providers/{namespace}/{provider}/refresh",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("provider" = String, Path, description = "Provider name"),
    ),
    responses(
        (status = 200, description = "Per-release refresh outcomes", body = RefreshReport),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 404, description = "Unknown provider", body = ApiError),
        (status = 502, description = "Upstream host error", body = ApiError),
        (status = 503, description = "Credential or source unavailable", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn refresh_provider(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((namespace, provider)): Path<(String, String)>,
) -> Result<Json<RefreshReport>, ApiError> {
    let (_, provider) = find_provider(&state, &namespace, &provider).await?;

    let report = extractor::refresh_provider(
        &state.db,
        &state.sources,
        state.audit.as_ref(),
        provider.id,
    )
    .await?;

    Ok(Json(report))
}

/// Deletes a version together with its binaries and documentation
#[utoipa::path(
    delete,
    path = "/v1/admin/providers/{namespace}/{provider}/versions/{version}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("provider" = String, Path, description = "Provider name"),
        ("version" = String, Path, description = "Version without the leading v"),
    ),
    responses(
        (status = 204, description = "Version deleted"),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 404, description = "Unknown provider or version", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_version(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((namespace, provider, version)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let (namespace, provider) = find_provider(&state, &namespace, &provider).await?;

    extractor::delete_version(
        &state.db,
        state.audit.as_ref(),
        OPERATOR_ACTOR,
        &namespace,
        &provider,
        &version,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
