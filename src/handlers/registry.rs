//! # Provider Registry Protocol Handlers
//!
//! Service discovery, version listing and the per-platform download object.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::provider_version_binary::{Architecture, OperatingSystem};
use crate::models::{namespace, provider};
use crate::protocol::{
    self, DownloadResponse, ServiceDiscovery, UpstreamUrls, VersionsResponse,
};
use crate::repositories::{
    GpgKeyRepository, ProviderRepository, ProviderVersionBinaryRepository,
    ProviderVersionRepository, RepositoryRepository,
};
use crate::server::AppState;

/// Registry service discovery document
#[utoipa::path(
    get,
    path = "/.well-known/terraform.json",
    responses(
        (status = 200, description = "Service discovery document", body = ServiceDiscovery, example = json!({
            "providers.v1": "https://registry.example.com/v1/providers/"
        }))
    ),
    tag = "registry"
)]
pub async fn service_discovery(State(state): State<AppState>) -> Json<ServiceDiscovery> {
    Json(protocol::service_discovery(&state.config.public_url))
}

/// Lists every published version of a provider with its platforms
#[utoipa::path(
    get,
    path = "/v1/providers/{namespace}/{provider}/versions",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("provider" = String, Path, description = "Provider name"),
    ),
    responses(
        (status = 200, description = "Available versions", body = VersionsResponse),
        (status = 404, description = "Unknown provider", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "registry"
)]
pub async fn list_versions(
    State(state): State<AppState>,
    Path((namespace, provider)): Path<(String, String)>,
) -> Result<Json<VersionsResponse>, ApiError> {
    let (_, provider) = find_provider(&state, &namespace, &provider).await?;

    let versions = ProviderVersionRepository::new(&state.db)
        .list_for_provider(provider.id)
        .await?;
    let ids: Vec<i32> = versions.iter().map(|version| version.id).collect();
    let binaries = ProviderVersionBinaryRepository::new(&state.db)
        .list_for_versions(&ids)
        .await?;

    Ok(Json(protocol::render_versions(&versions, &binaries)))
}

/// Returns the download object for one platform build of a version
#[utoipa::path(
    get,
    path = "/v1/providers/{namespace}/{provider}/{version}/download/{os}/{arch}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("provider" = String, Path, description = "Provider name"),
        ("version" = String, Path, description = "Version without the leading v"),
        ("os" = String, Path, description = "Operating system: freebsd, darwin, windows or linux"),
        ("arch" = String, Path, description = "Architecture: amd64, arm, arm64 or 386"),
    ),
    responses(
        (status = 200, description = "Platform download object", body = DownloadResponse),
        (status = 400, description = "Unknown operating system or architecture", body = ApiError),
        (status = 404, description = "Unknown provider, version or platform", body = ApiError),
        (status = 503, description = "Upstream host not configured", body = ApiError)
    ),
    tag = "registry"
)]
pub async fn download(
    State(state): State<AppState>,
    Path((namespace, provider, version, os, arch)): Path<(String, String, String, String, String)>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let operating_system = OperatingSystem::from_str(&os).map_err(|value| {
        validation_error(
            "Unsupported operating system",
            json!({ "os": format!("'{value}' is not one of freebsd, darwin, windows, linux") }),
        )
    })?;
    let architecture = Architecture::from_str(&arch).map_err(|value| {
        validation_error(
            "Unsupported architecture",
            json!({ "arch": format!("'{value}' is not one of amd64, arm, arm64, 386") }),
        )
    })?;

    let (namespace, provider) = find_provider(&state, &namespace, &provider).await?;
    let address = format!("{}/{}", namespace.name, provider.name);

    let version = ProviderVersionRepository::new(&state.db)
        .find_by_version(provider.id, &version)
        .await?
        .ok_or_else(|| not_found(&format!("Version {version} of {address} not found")))?;
    let binary = ProviderVersionBinaryRepository::new(&state.db)
        .find_for_platform(version.id, operating_system, architecture)
        .await?
        .ok_or_else(|| {
            not_found(&format!(
                "No {os}_{arch} build of {address} {}",
                version.version
            ))
        })?;
    let repository = RepositoryRepository::new(&state.db)
        .find_by_id(provider.repository_id)
        .await?
        .ok_or_else(|| not_found(&format!("Repository of {address} not found")))?;
    let signing_key = GpgKeyRepository::new(&state.db)
        .find_by_id(version.gpg_key_id)
        .await?;

    let source = state.sources.get(&repository.provider_source).ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SOURCE_NOT_CONFIGURED",
            &format!(
                "Provider source {} is not configured",
                repository.provider_source
            ),
        )
    })?;
    let urls = UpstreamUrls {
        source: source.as_ref(),
        repository: &repository,
    };

    Ok(Json(protocol::render_download(
        &repository.name,
        &version,
        &binary,
        signing_key.as_slice(),
        &urls,
    )))
}

pub(crate) async fn find_provider(
    state: &AppState,
    namespace: &str,
    provider: &str,
) -> Result<(namespace::Model, provider::Model), ApiError> {
    ProviderRepository::new(&state.db)
        .find_by_address(namespace, provider)
        .await?
        .ok_or_else(|| not_found(&format!("Provider {namespace}/{provider} not found")))
}
