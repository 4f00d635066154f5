//! # Provider sources
//!
//! Adapters over the upstream hosts that publish provider releases. Each
//! repository stores the name of the configured source that hosts it, and
//! [`ProviderSourceRegistry`] resolves that name to an adapter. Discovery and
//! extraction only ever talk to the [`ProviderSource`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{AppConfig, ProviderSourceType};
use crate::credentials::{Credential, CredentialError};
use crate::models::{ReleaseMetadata, namespace, repository};

pub mod github;

pub use github::GithubSource;

/// Listing endpoints are always requested with this many items per page.
/// A shorter page marks the end of the listing.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to upstream host failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status} for {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("could not obtain a fresh credential: {0}")]
    Credential(String),
}

impl SourceError {
    /// Transport failures and 5xx answers may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport(_) => true,
            SourceError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            SourceError::InvalidResponse(_) | SourceError::Credential(_) => false,
        }
    }
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Whether another page may follow this one.
    pub fn has_more(&self) -> bool {
        self.items.len() >= PAGE_SIZE
    }
}

/// A release as listed by the upstream host. Every field may be missing in
/// malformed entries; discovery discards those.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpstreamRelease {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub tag_name: Option<String>,
    pub tarball_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// An asset attached to an upstream release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpstreamAsset {
    pub id: i64,
    pub name: String,
    pub browser_download_url: String,
}

/// Capabilities discovery and extraction need from an upstream host.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Configured name, as stored on repositories.
    fn name(&self) -> &str;

    /// Lists releases newest-first. Non-2xx answers yield an empty page.
    async fn list_releases(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        page: u32,
    ) -> Result<Page<UpstreamRelease>, SourceError>;

    /// Lists the assets of one release. Non-2xx answers yield an empty page.
    async fn list_release_assets(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        release_id: i64,
        page: u32,
    ) -> Result<Page<UpstreamAsset>, SourceError>;

    /// Resolves the commit a tag points at, `None` if the tag is unknown.
    async fn get_commit_hash_by_tag(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        tag: &str,
    ) -> Result<Option<String>, SourceError>;

    /// Downloads a release asset by file name, `None` if it is not attached
    /// or cannot be fetched.
    async fn download_artifact(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        release: &ReleaseMetadata,
        artifact_name: &str,
    ) -> Result<Option<Vec<u8>>, SourceError>;

    /// Downloads the release's source archive, `None` on non-2xx.
    async fn download_archive(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        archive_url: &str,
    ) -> Result<Option<Vec<u8>>, SourceError>;

    /// Finds the app installation covering a namespace, if any.
    async fn resolve_installation_id(
        &self,
        namespace: &namespace::Model,
    ) -> Result<Option<i64>, SourceError>;

    /// Resolves the credential to use for a provider in this namespace.
    async fn resolve_credential(
        &self,
        namespace: &namespace::Model,
        use_default: bool,
    ) -> Result<Credential, CredentialError>;

    /// Forgets a cached credential so the next resolution mints a new one.
    fn invalidate_credential(&self, credential: &Credential);

    /// Public download URL of a release asset on the upstream host.
    fn public_url(
        &self,
        repository: &repository::Model,
        version: &str,
        artifact_name: &str,
    ) -> String;
}

/// Name-indexed set of configured provider sources.
#[derive(Clone, Default)]
pub struct ProviderSourceRegistry {
    sources: HashMap<String, Arc<dyn ProviderSource>>,
}

impl ProviderSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one adapter per configured source.
    pub fn from_config(config: &AppConfig) -> Result<Self, CredentialError> {
        let http = reqwest::Client::new();
        let mut registry = Self::new();
        for source in &config.provider_sources {
            let adapter: Arc<dyn ProviderSource> = match source.source_type {
                ProviderSourceType::Github => {
                    Arc::new(GithubSource::from_config(source, http.clone())?)
                }
            };
            registry.register(adapter);
        }
        Ok(registry)
    }

    pub fn register(&mut self, source: Arc<dyn ProviderSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderSource>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for ProviderSourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}
