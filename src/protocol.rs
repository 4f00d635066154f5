//! # Registry protocol responses
//!
//! Pure renderers from stored rows to the JSON documents the provider
//! registry protocol defines. Nothing here touches the database or the
//! network; handlers load rows and pass them in.

use serde::Serialize;
use utoipa::ToSchema;

use crate::artifacts::{shasums_name, shasums_signature_name};
use crate::docs::split_front_matter;
use crate::models::provider_version_documentation::DocumentationType;
use crate::models::{
    gpg_key, provider_version, provider_version_binary, provider_version_documentation, repository,
};
use crate::sources::ProviderSource;

pub const DOCUMENT_TYPE: &str = "provider-docs";

/// Produces public URLs for release artifacts.
pub trait PublicUrlBuilder: Send + Sync {
    fn artifact_url(&self, version: &str, artifact_name: &str) -> String;
}

/// Points clients straight at the upstream host's release downloads.
pub struct UpstreamUrls<'a> {
    pub source: &'a dyn ProviderSource,
    pub repository: &'a repository::Model,
}

impl PublicUrlBuilder for UpstreamUrls<'_> {
    fn artifact_url(&self, version: &str, artifact_name: &str) -> String {
        self.source.public_url(self.repository, version, artifact_name)
    }
}

/// Transforms documentation content before it is returned.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, content: &str) -> String;
}

/// Drops the YAML front matter, leaving the markdown body.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripFrontMatter;

impl ContentRenderer for StripFrontMatter {
    fn render(&self, content: &str) -> String {
        match split_front_matter(content) {
            Some((_, body)) => body.to_string(),
            None => content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GpgPublicKey {
    pub key_id: String,
    pub ascii_armor: String,
    pub trust_signature: String,
    pub source: String,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SigningKeys {
    pub gpg_public_keys: Vec<GpgPublicKey>,
}

/// Per-platform download document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DownloadResponse {
    pub protocols: Vec<String>,
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub download_url: String,
    pub shasums_url: String,
    pub shasums_signature_url: String,
    pub shasum: String,
    pub signing_keys: SigningKeys,
}

pub fn render_download(
    repository_name: &str,
    version: &provider_version::Model,
    binary: &provider_version_binary::Model,
    signing_keys: &[gpg_key::Model],
    urls: &dyn PublicUrlBuilder,
) -> DownloadResponse {
    let version_text = version.version.as_str();
    DownloadResponse {
        protocols: version.protocols(),
        os: binary.operating_system.to_string(),
        arch: binary.architecture.to_string(),
        filename: binary.filename.clone(),
        download_url: urls.artifact_url(version_text, &binary.filename),
        shasums_url: urls.artifact_url(version_text, &shasums_name(repository_name, version_text)),
        shasums_signature_url: urls.artifact_url(
            version_text,
            &shasums_signature_name(repository_name, version_text),
        ),
        shasum: binary.checksum.clone(),
        signing_keys: SigningKeys {
            gpg_public_keys: signing_keys
                .iter()
                .map(|key| GpgPublicKey {
                    key_id: key.key_id().to_string(),
                    ascii_armor: key.ascii_armor.clone(),
                    trust_signature: String::new(),
                    source: String::new(),
                    source_url: None,
                })
                .collect(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VersionEntry {
    pub version: String,
    pub protocols: Vec<String>,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VersionsResponse {
    pub versions: Vec<VersionEntry>,
}

/// Renders the version listing. Binaries are matched to versions by id.
pub fn render_versions(
    versions: &[provider_version::Model],
    binaries: &[provider_version_binary::Model],
) -> VersionsResponse {
    VersionsResponse {
        versions: versions
            .iter()
            .map(|version| VersionEntry {
                version: version.version.clone(),
                protocols: version.protocols(),
                platforms: binaries
                    .iter()
                    .filter(|binary| binary.provider_version_id == version.id)
                    .map(|binary| Platform {
                        os: binary.operating_system.to_string(),
                        arch: binary.architecture.to_string(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ServiceDiscovery {
    #[serde(rename = "providers.v1")]
    pub providers_v1: String,
}

/// The `.well-known/terraform.json` document.
pub fn service_discovery(public_url: &str) -> ServiceDiscovery {
    ServiceDiscovery {
        providers_v1: format!("{}/v1/providers/", public_url.trim_end_matches('/')),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocAttributes {
    pub category: String,
    pub language: String,
    pub path: String,
    pub slug: String,
    pub subcategory: Option<String>,
    pub title: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    pub attributes: DocAttributes,
    pub links: DocLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocListResponse {
    pub data: Vec<DocResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocDetailResponse {
    pub data: DocResource,
}

pub fn render_doc_outline(doc: &provider_version_documentation::Model) -> DocResource {
    DocResource {
        resource_type: DOCUMENT_TYPE.to_string(),
        id: doc.id.to_string(),
        attributes: DocAttributes {
            category: doc.documentation_type.to_string(),
            language: doc.language.clone(),
            path: documentation_path(doc),
            slug: doc.slug.clone(),
            subcategory: doc.subcategory.clone(),
            title: doc.title.clone(),
            truncated: false,
            content: None,
        },
        links: DocLinks {
            self_link: format!("/v2/provider-docs/{}", doc.id),
        },
    }
}

/// Outline plus the page content, optionally passed through `renderer`.
pub fn render_doc_detail(
    doc: &provider_version_documentation::Model,
    renderer: Option<&dyn ContentRenderer>,
) -> DocResource {
    let mut resource = render_doc_outline(doc);
    resource.attributes.content = Some(match renderer {
        Some(renderer) => renderer.render(&doc.content),
        None => doc.content.clone(),
    });
    resource
}

/// Path of the page inside the source repository.
fn documentation_path(doc: &provider_version_documentation::Model) -> String {
    let legacy = doc.filename.ends_with(".html.markdown") || doc.filename.ends_with(".html.md");
    if legacy {
        let directory = match doc.documentation_type {
            DocumentationType::Resource => Some("r"),
            DocumentationType::DataSource => Some("d"),
            DocumentationType::Guide => Some("guides"),
            DocumentationType::Overview | DocumentationType::Provider => None,
        };
        return match directory {
            Some(directory) => format!("website/docs/{directory}/{}", doc.filename),
            None => format!("website/docs/{}", doc.filename),
        };
    }

    match doc.documentation_type.directory() {
        Some(directory) => format!("docs/{directory}/{}", doc.filename),
        None => format!("docs/{}", doc.filename),
    }
}
