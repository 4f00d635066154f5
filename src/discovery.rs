//! # Release discovery
//!
//! Walks a repository's upstream releases newest-first and returns the ones
//! not imported yet. The walk stops at the first release whose version is
//! already stored: upstream lists releases by creation date, so everything
//! after it is assumed to be known as well. Releases back-filled out of order
//! are therefore not picked up.

use chrono::Utc;
use sea_orm::ConnectionTrait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::credentials::Credential;
use crate::models::{ReleaseArtifactMetadata, ReleaseMetadata, provider, repository};
use crate::repositories::{ProviderVersionRepository, RepositoryError};
use crate::sources::{ProviderSource, SourceError, UpstreamRelease};
use crate::version::VersionNumber;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Returns the releases of `repository` newer than anything stored for
/// `provider`, newest first.
#[instrument(skip_all, fields(provider_id = provider.id, repo = %repository.name))]
pub async fn find_new_releases<C: ConnectionTrait>(
    conn: &C,
    provider: &provider::Model,
    repository: &repository::Model,
    source: &dyn ProviderSource,
    credential: &Credential,
) -> Result<Vec<ReleaseMetadata>, DiscoveryError> {
    let versions = ProviderVersionRepository::new(conn);
    let mut discovered = Vec::new();
    let mut page_number = 1;

    'pages: loop {
        let page = source.list_releases(repository, credential, page_number).await?;
        debug!(page = page_number, entries = page.items.len(), "listed releases");

        for entry in &page.items {
            let Some(candidate) = Candidate::from_upstream(entry) else {
                continue;
            };

            if versions.exists(provider.id, candidate.version.as_str()).await? {
                info!(version = %candidate.version, "reached an imported release, stopping");
                break 'pages;
            }

            let Some(commit_hash) = source
                .get_commit_hash_by_tag(repository, credential, candidate.tag)
                .await?
            else {
                warn!(tag = candidate.tag, "tag does not resolve to a commit, skipping release");
                continue;
            };

            let artifacts = list_artifacts(source, repository, credential, candidate.id).await?;

            discovered.push(ReleaseMetadata {
                id: candidate.id,
                name: candidate.name.to_string(),
                tag: candidate.tag.to_string(),
                version: candidate.version,
                commit_hash,
                archive_url: candidate.archive_url.to_string(),
                published_at: entry.published_at.unwrap_or_else(Utc::now),
                artifacts,
            });
        }

        if !page.has_more() {
            break;
        }
        page_number += 1;
    }

    info!(count = discovered.len(), "discovered new releases");
    Ok(discovered)
}

/// The fields of an upstream entry discovery cannot do without.
struct Candidate<'a> {
    id: i64,
    name: &'a str,
    tag: &'a str,
    archive_url: &'a str,
    version: VersionNumber,
}

impl<'a> Candidate<'a> {
    fn from_upstream(entry: &'a UpstreamRelease) -> Option<Self> {
        let (Some(id), Some(name), Some(tag), Some(archive_url)) = (
            entry.id,
            entry.name.as_deref(),
            entry.tag_name.as_deref(),
            entry.tarball_url.as_deref(),
        ) else {
            debug!(release_id = ?entry.id, "release entry is missing required fields, skipping");
            return None;
        };

        if entry.draft {
            debug!(tag, "skipping draft release");
            return None;
        }

        match VersionNumber::from_tag(tag) {
            Ok(version) => Some(Self {
                id,
                name,
                tag,
                archive_url,
                version,
            }),
            Err(err) => {
                debug!(tag, error = %err, "tag is not a release version, skipping");
                None
            }
        }
    }
}

async fn list_artifacts(
    source: &dyn ProviderSource,
    repository: &repository::Model,
    credential: &Credential,
    release_id: i64,
) -> Result<Vec<ReleaseArtifactMetadata>, SourceError> {
    let mut artifacts = Vec::new();
    let mut page_number = 1;
    loop {
        let page = source
            .list_release_assets(repository, credential, release_id, page_number)
            .await?;
        let has_more = page.has_more();
        artifacts.extend(page.items.into_iter().map(|asset| ReleaseArtifactMetadata {
            id: asset.id,
            name: asset.name,
            download_url: asset.browser_download_url,
        }));
        if !has_more {
            return Ok(artifacts);
        }
        page_number += 1;
    }
}
