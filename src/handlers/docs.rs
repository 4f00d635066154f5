//! # Provider Documentation Handlers

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::provider_version_documentation::DocumentationType;
use crate::protocol::{self, DocDetailResponse, DocListResponse};
use crate::repositories::{DocumentationFilter, ProviderVersionDocumentationRepository};
use crate::server::AppState;

/// Filters for the documentation listing
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocListQuery {
    /// Provider version id (required)
    #[serde(rename = "filter[provider-version]")]
    #[param(rename = "filter[provider-version]")]
    pub provider_version: Option<String>,
    /// overview, provider, resources, data-sources or guides
    #[serde(rename = "filter[category]")]
    #[param(rename = "filter[category]")]
    pub category: Option<String>,
    #[serde(rename = "filter[slug]")]
    #[param(rename = "filter[slug]")]
    pub slug: Option<String>,
    #[serde(rename = "filter[language]")]
    #[param(rename = "filter[language]")]
    pub language: Option<String>,
}

impl DocListQuery {
    fn into_filter(self) -> Result<DocumentationFilter, ApiError> {
        let provider_version_id = self
            .provider_version
            .as_deref()
            .ok_or_else(|| {
                validation_error(
                    "Missing documentation filter",
                    json!({ "filter[provider-version]": "Required filter is missing" }),
                )
            })?
            .parse::<i32>()
            .map_err(|_| {
                validation_error(
                    "Invalid documentation filter",
                    json!({ "filter[provider-version]": "Must be a provider version id" }),
                )
            })?;

        let documentation_type = self
            .category
            .as_deref()
            .map(DocumentationType::from_str)
            .transpose()
            .map_err(|value| {
                validation_error(
                    "Invalid documentation filter",
                    json!({ "filter[category]": format!("Unknown category '{value}'") }),
                )
            })?;

        Ok(DocumentationFilter {
            provider_version_id,
            documentation_type,
            slug: self.slug.filter(|slug| !slug.is_empty()),
            language: self.language.filter(|language| !language.is_empty()),
        })
    }
}

/// Lists documentation outlines of one provider version
#[utoipa::path(
    get,
    path = "/v2/provider-docs",
    params(DocListQuery),
    responses(
        (status = 200, description = "Documentation outlines", body = DocListResponse),
        (status = 400, description = "Missing or invalid filter", body = ApiError)
    ),
    tag = "docs"
)]
pub async fn list_docs(
    State(state): State<AppState>,
    Query(query): Query<DocListQuery>,
) -> Result<Json<DocListResponse>, ApiError> {
    let filter = query.into_filter()?;
    let docs = ProviderVersionDocumentationRepository::new(&state.db)
        .list(&filter)
        .await?;

    Ok(Json(DocListResponse {
        data: docs.iter().map(protocol::render_doc_outline).collect(),
    }))
}

/// Returns one documentation page including its content
#[utoipa::path(
    get,
    path = "/v2/provider-docs/{id}",
    params(("id" = i32, Path, description = "Documentation page id")),
    responses(
        (status = 200, description = "Documentation page", body = DocDetailResponse),
        (status = 404, description = "Unknown page", body = ApiError)
    ),
    tag = "docs"
)]
pub async fn get_doc(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DocDetailResponse>, ApiError> {
    let doc = ProviderVersionDocumentationRepository::new(&state.db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&format!("Documentation page {id} not found")))?;

    Ok(Json(DocDetailResponse {
        data: protocol::render_doc_detail(&doc, None),
    }))
}
