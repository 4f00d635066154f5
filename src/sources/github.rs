//! GitHub release source.
//!
//! Talks to the GitHub REST API (or a GitHub Enterprise instance configured
//! through `api_url`). Listing endpoints degrade to an empty page on non-2xx
//! answers; a 401 on an installation token invalidates it and retries once.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Page, PAGE_SIZE, ProviderSource, SourceError, UpstreamAsset, UpstreamRelease};
use crate::config::ProviderSourceConfig;
use crate::credentials::{Credential, CredentialBroker, CredentialError, USER_AGENT, truncate};
use crate::models::namespace::NamespaceType;
use crate::models::{ReleaseMetadata, namespace, repository};

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_BINARY: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    id: i64,
}

pub struct GithubSource {
    name: String,
    base_url: String,
    api_url: String,
    http: reqwest::Client,
    broker: CredentialBroker,
}

impl GithubSource {
    pub fn from_config(
        config: &ProviderSourceConfig,
        http: reqwest::Client,
    ) -> Result<Self, CredentialError> {
        let broker = CredentialBroker::from_config(config, http.clone())?;
        Ok(Self::new(
            &config.name,
            &config.base_url,
            &config.api_url,
            http,
            broker,
        ))
    }

    pub fn new(
        name: &str,
        base_url: &str,
        api_url: &str,
        http: reqwest::Client,
        broker: CredentialBroker,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            http,
            broker,
        }
    }

    pub fn broker(&self) -> &CredentialBroker {
        &self.broker
    }

    fn repo_url(&self, repository: &repository::Model, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_url, repository.owner, repository.name, path
        )
    }

    async fn send(
        &self,
        url: &str,
        token: &str,
        accept: &str,
        query: &[(&str, String)],
    ) -> Result<Response, SourceError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        Ok(response)
    }

    /// GET with the 401 rule: an installation token that is rejected is
    /// dropped from the cache and the request is repeated once with a fresh
    /// token. Static tokens are not retried.
    async fn get(
        &self,
        url: &str,
        credential: &Credential,
        accept: &str,
        query: &[(&str, String)],
    ) -> Result<Response, SourceError> {
        let response = self.send(url, credential.token(), accept, query).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(installation_id) = credential.installation_id() else {
            return Ok(response);
        };

        warn!(installation_id, url, "installation token rejected, requesting a fresh one");
        self.broker.invalidate(installation_id);
        let fresh = self
            .broker
            .installation_token(installation_id)
            .await
            .map_err(|err| match err {
                CredentialError::Source(source) => source,
                other => SourceError::Credential(other.to_string()),
            })?;
        self.send(url, fresh.token(), accept, query).await
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        credential: &Credential,
        page: u32,
    ) -> Result<Page<T>, SourceError> {
        let query = [
            ("per_page", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.get(url, credential, ACCEPT_JSON, &query).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                url,
                body = %truncate(&body),
                "listing request failed, treating as empty page"
            );
            return Ok(Page::empty());
        }

        let items: Vec<T> = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("{url}: {e}")))?;
        Ok(Page::new(items))
    }

    async fn get_bytes(
        &self,
        url: &str,
        credential: &Credential,
        accept: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        let response = self.get(url, credential, accept, &[]).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url, "download failed");
            return Ok(None);
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }
}

#[async_trait]
impl ProviderSource for GithubSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, repository, credential), fields(repo = %repository.name))]
    async fn list_releases(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        page: u32,
    ) -> Result<Page<UpstreamRelease>, SourceError> {
        let url = self.repo_url(repository, "/releases");
        self.get_page(&url, credential, page).await
    }

    #[instrument(skip(self, repository, credential), fields(repo = %repository.name))]
    async fn list_release_assets(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        release_id: i64,
        page: u32,
    ) -> Result<Page<UpstreamAsset>, SourceError> {
        let url = self.repo_url(repository, &format!("/releases/{release_id}/assets"));
        self.get_page(&url, credential, page).await
    }

    async fn get_commit_hash_by_tag(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        tag: &str,
    ) -> Result<Option<String>, SourceError> {
        let url = self.repo_url(repository, &format!("/commits/{tag}"));
        let response = self.get(&url, credential, ACCEPT_JSON, &[]).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(tag, "tag does not resolve to a commit");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url,
                body: truncate(&body),
            });
        }

        let commit: CommitResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("{url}: {e}")))?;
        Ok(Some(commit.sha))
    }

    async fn download_artifact(
        &self,
        repository: &repository::Model,
        credential: &Credential,
        release: &ReleaseMetadata,
        artifact_name: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        let Some(artifact) = release.artifact(artifact_name) else {
            debug!(artifact_name, release = %release.tag, "artifact not attached to release");
            return Ok(None);
        };
        let url = self.repo_url(repository, &format!("/releases/assets/{}", artifact.id));
        self.get_bytes(&url, credential, ACCEPT_BINARY).await
    }

    async fn download_archive(
        &self,
        _repository: &repository::Model,
        credential: &Credential,
        archive_url: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        self.get_bytes(archive_url, credential, ACCEPT_JSON).await
    }

    #[instrument(skip(self, namespace), fields(namespace = %namespace.name))]
    async fn resolve_installation_id(
        &self,
        namespace: &namespace::Model,
    ) -> Result<Option<i64>, SourceError> {
        if !self.broker.has_app() {
            return Ok(None);
        }

        let path = match namespace.namespace_type {
            NamespaceType::GithubOrganisation => format!("/orgs/{}/installation", namespace.name),
            NamespaceType::GithubUser | NamespaceType::None => {
                format!("/users/{}/installation", namespace.name)
            }
        };
        let url = format!("{}{}", self.api_url, path);
        let assertion = self
            .broker
            .app_assertion()
            .map_err(|e| SourceError::Credential(e.to_string()))?;

        let response = self.send(&url, &assertion, ACCEPT_JSON, &[]).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url,
                body: truncate(&body),
            });
        }

        let installation: InstallationResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("{url}: {e}")))?;
        Ok(Some(installation.id))
    }

    async fn resolve_credential(
        &self,
        namespace: &namespace::Model,
        use_default: bool,
    ) -> Result<Credential, CredentialError> {
        let installation_id = if use_default {
            None
        } else {
            self.resolve_installation_id(namespace).await?
        };
        self.broker.resolve(installation_id, use_default).await
    }

    fn invalidate_credential(&self, credential: &Credential) {
        if let Some(installation_id) = credential.installation_id() {
            self.broker.invalidate(installation_id);
        }
    }

    fn public_url(&self, repository: &repository::Model, version: &str, artifact_name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/v{}/{}",
            self.base_url, repository.owner, repository.name, version, artifact_name
        )
    }
}
