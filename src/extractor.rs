//! # Release extraction
//!
//! Turns a discovered upstream release into stored provider data: a trusted
//! version row, one binary per platform, and the documentation pages found
//! in the source archive.
//!
//! A refresh runs discovery and then imports every new release oldest-first
//! inside one outer transaction. Each release gets its own savepoint, so a
//! failing release rolls back only its own rows while earlier imports stay.

use std::time::Instant;

use metrics::{counter, histogram};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::artifacts::{
    AssetRejection, AssetRejectionKind, ChecksumManifest, ManifestError, Platform,
    is_binary_candidate, manifest_name, parse_binary_name,
};
use crate::audit::{AuditEvent, AuditSink, SYSTEM_ACTOR};
use crate::credentials::{Credential, CredentialError};
use crate::discovery::{DiscoveryError, find_new_releases};
use crate::docs::{DocumentationError, extract_documentation};
use crate::models::{
    ReleaseMetadata, namespace, provider, provider_version, provider_version_binary, repository,
};
use crate::repositories::{
    NamespaceRepository, NewBinary, NewDocumentation, NewProviderVersion,
    ProviderRepository, ProviderVersionBinaryRepository, ProviderVersionDocumentationRepository,
    ProviderVersionRepository, RepositoryError, RepositoryRepository, VERSION_ENTITY,
};
use crate::signature::{SignatureError, verify_release};
use crate::sources::{ProviderSource, ProviderSourceRegistry, SourceError};
use crate::version::VersionError;

/// Stamped on every version row this extractor writes.
pub const EXTRACTION_VERSION: i32 = 1;

/// Protocol versions assumed when a release ships no manifest.
pub const DEFAULT_PROTOCOL_VERSIONS: [&str; 1] = ["5.0"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no namespace key verifies the signature of release {version}")]
    UntrustedRelease { version: String },

    #[error("release is missing required artifact {artifact}")]
    MissingArtifact { artifact: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("provider source '{0}' is not configured")]
    SourceNotConfigured(String),

    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error("invalid checksum manifest: {0}")]
    InvalidManifest(#[from] ManifestError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Database(RepositoryError),

    #[error(transparent)]
    Documentation(#[from] DocumentationError),
}

impl ExtractionError {
    /// True only when the version row itself already exists. Conflicts on
    /// binaries or documentation are real import failures.
    pub fn is_version_already_imported(&self) -> bool {
        matches!(
            self,
            ExtractionError::AlreadyExists { entity, .. } if *entity == VERSION_ENTITY
        )
    }
}

impl From<RepositoryError> for ExtractionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AlreadyExists { entity, key } => {
                ExtractionError::AlreadyExists { entity, key }
            }
            RepositoryError::NotFound { entity, key } => ExtractionError::NotFound { entity, key },
            other => ExtractionError::Database(other),
        }
    }
}

impl From<DbErr> for ExtractionError {
    fn from(err: DbErr) -> Self {
        ExtractionError::Database(RepositoryError::Database(err))
    }
}

impl From<SignatureError> for ExtractionError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MissingArtifact { artifact } => {
                ExtractionError::MissingArtifact { artifact }
            }
            SignatureError::Source(source) => ExtractionError::Source(source),
            SignatureError::Database(db) => db.into(),
        }
    }
}

impl From<DiscoveryError> for ExtractionError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Source(source) => ExtractionError::Source(source),
            DiscoveryError::Repository(db) => db.into(),
        }
    }
}

/// Everything an import needs to know about the provider it imports into.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    pub namespace: &'a namespace::Model,
    pub provider: &'a provider::Model,
    pub repository: &'a repository::Model,
    pub source: &'a dyn ProviderSource,
}

impl ImportContext<'_> {
    /// `namespace/provider`, as used in registry addresses.
    pub fn address(&self) -> String {
        format!("{}/{}", self.namespace.name, self.provider.name)
    }
}

/// Result of a successful single-release import.
#[derive(Debug, Clone)]
pub struct ImportedVersion {
    pub version: provider_version::Model,
    pub binaries: Vec<provider_version_binary::Model>,
    pub documentation_pages: usize,
    pub rejected_assets: Vec<AssetRejection>,
    /// Whether this version became the provider's latest version
    pub latest: bool,
}

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    #[serde(default)]
    metadata: ReleaseManifestMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseManifestMetadata {
    #[serde(default)]
    protocol_versions: Vec<String>,
}

/// Imports one release. Every step may abort the import; callers run it
/// inside a savepoint so partial writes are discarded.
#[instrument(skip_all, fields(provider = %context.address(), version = %release.version))]
pub async fn import_version<C: ConnectionTrait>(
    conn: &C,
    context: &ImportContext<'_>,
    release: &ReleaseMetadata,
) -> Result<ImportedVersion, ExtractionError> {
    let ImportContext {
        namespace,
        provider,
        repository,
        source,
    } = *context;
    let version_text = release.version.as_str();

    let credential = source
        .resolve_credential(namespace, provider.use_default_credential)
        .await?;

    let signed = verify_release(conn, namespace, repository, release, source, &credential)
        .await?
        .ok_or_else(|| ExtractionError::UntrustedRelease {
            version: version_text.to_string(),
        })?;
    let checksums = ChecksumManifest::parse(&signed.shasums)?;
    let protocol_versions =
        read_protocol_versions(source, repository, &credential, release).await?;

    let versions = ProviderVersionRepository::new(conn);
    let version = versions
        .create(NewProviderVersion {
            provider_id: provider.id,
            version: release.version.clone(),
            git_tag: release.tag.clone(),
            commit_hash: release.commit_hash.clone(),
            published_at: release.published_at,
            gpg_key_id: signed.key.id,
            protocol_versions,
            extraction_version: EXTRACTION_VERSION,
        })
        .await?;

    let binary_repo = ProviderVersionBinaryRepository::new(conn);
    let mut binaries = Vec::new();
    let mut rejected_assets = Vec::new();
    for artifact in &release.artifacts {
        if !is_binary_candidate(&repository.name, version_text, &artifact.name) {
            continue;
        }

        match fetch_binary(source, repository, &credential, release, &checksums, &artifact.name)
            .await
        {
            Ok((platform, checksum)) => {
                let binary = binary_repo
                    .create(NewBinary {
                        provider_version_id: version.id,
                        operating_system: platform.os,
                        architecture: platform.arch,
                        filename: artifact.name.clone(),
                        checksum,
                    })
                    .await?;
                debug!(filename = %binary.filename, "stored binary");
                binaries.push(binary);
            }
            Err(rejection) => {
                warn!(
                    filename = %rejection.filename,
                    kind = rejection.kind.as_str(),
                    detail = %rejection.detail,
                    "rejected release asset"
                );
                counter!("provider_assets_rejected_total", "kind" => rejection.kind.as_str())
                    .increment(1);
                rejected_assets.push(rejection);
            }
        }
    }

    let documentation_pages =
        store_documentation(conn, source, repository, &credential, release, version.id).await?;

    let latest = versions
        .recompute_latest_version(provider.id)
        .await?
        .is_some_and(|latest| latest.id == version.id);

    info!(
        version_id = version.id,
        binaries = binaries.len(),
        rejected = rejected_assets.len(),
        documentation_pages,
        latest,
        "imported provider version"
    );

    Ok(ImportedVersion {
        version,
        binaries,
        documentation_pages,
        rejected_assets,
        latest,
    })
}

async fn fetch_binary(
    source: &dyn ProviderSource,
    repository: &repository::Model,
    credential: &Credential,
    release: &ReleaseMetadata,
    checksums: &ChecksumManifest,
    filename: &str,
) -> Result<(Platform, String), AssetRejection> {
    let platform = parse_binary_name(&repository.name, release.version.as_str(), filename)?;

    if checksums.checksum(filename).is_none() {
        return Err(AssetRejection::new(
            filename,
            AssetRejectionKind::MissingChecksum,
            "no entry in checksum manifest",
        ));
    }

    let bytes = match source
        .download_artifact(repository, credential, release, filename)
        .await
    {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return Err(AssetRejection::new(
                filename,
                AssetRejectionKind::DownloadFailed,
                "asset could not be downloaded",
            ));
        }
        Err(err) => {
            return Err(AssetRejection::new(
                filename,
                AssetRejectionKind::DownloadFailed,
                err.to_string(),
            ));
        }
    };

    let checksum = checksums.verify(filename, &bytes)?;
    Ok((platform, checksum))
}

/// Reads supported protocol versions from the release manifest, falling back
/// to the default when the manifest is absent, malformed or empty.
async fn read_protocol_versions(
    source: &dyn ProviderSource,
    repository: &repository::Model,
    credential: &Credential,
    release: &ReleaseMetadata,
) -> Result<Vec<String>, SourceError> {
    let name = manifest_name(&repository.name, release.version.as_str());
    let default = || DEFAULT_PROTOCOL_VERSIONS.iter().map(|v| v.to_string()).collect();

    let Some(bytes) = source
        .download_artifact(repository, credential, release, &name)
        .await?
    else {
        return Ok(default());
    };

    match serde_json::from_slice::<ReleaseManifest>(&bytes) {
        Ok(manifest) if !manifest.metadata.protocol_versions.is_empty() => {
            Ok(manifest.metadata.protocol_versions)
        }
        Ok(_) => Ok(default()),
        Err(err) => {
            warn!(manifest = %name, error = %err, "release manifest is not valid JSON");
            Ok(default())
        }
    }
}

async fn store_documentation<C: ConnectionTrait>(
    conn: &C,
    source: &dyn ProviderSource,
    repository: &repository::Model,
    credential: &Credential,
    release: &ReleaseMetadata,
    provider_version_id: i32,
) -> Result<usize, ExtractionError> {
    let Some(archive) = source
        .download_archive(repository, credential, &release.archive_url)
        .await?
    else {
        warn!(archive_url = %release.archive_url, "source archive unavailable, no documentation stored");
        return Ok(0);
    };

    let pages = extract_documentation(&archive)?;
    let documentation = ProviderVersionDocumentationRepository::new(conn);
    let count = pages.len();
    for page in pages {
        documentation
            .create(NewDocumentation {
                provider_version_id,
                documentation_type: page.documentation_type,
                title: page.title,
                slug: page.slug,
                filename: page.filename,
                language: page.language,
                subcategory: page.subcategory,
                description: page.description,
                content: page.content,
            })
            .await?;
    }
    Ok(count)
}

/// Outcome of one release during a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseStatus {
    Imported {
        version_id: i32,
        binaries: usize,
        documentation_pages: usize,
        rejected_assets: Vec<AssetRejection>,
        latest: bool,
    },
    AlreadyExists,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReleaseOutcome {
    pub version: String,
    pub tag: String,
    #[serde(flatten)]
    pub status: ReleaseStatus,
}

/// Per-release summary of a provider refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RefreshReport {
    pub provider: String,
    pub discovered: usize,
    pub outcomes: Vec<ReleaseOutcome>,
    pub latest_version: Option<String>,
}

impl RefreshReport {
    pub fn imported(&self) -> usize {
        self.count(|status| matches!(status, ReleaseStatus::Imported { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, ReleaseStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&ReleaseStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.status))
            .count()
    }
}

/// Discovers and imports every new release of a provider.
#[instrument(skip(db, sources, audit))]
pub async fn refresh_provider(
    db: &DatabaseConnection,
    sources: &ProviderSourceRegistry,
    audit: &dyn AuditSink,
    provider_id: i32,
) -> Result<RefreshReport, ExtractionError> {
    let started = Instant::now();

    let provider = ProviderRepository::new(db)
        .find_by_id(provider_id)
        .await?
        .ok_or_else(|| ExtractionError::NotFound {
            entity: "provider",
            key: provider_id.to_string(),
        })?;
    let namespace = NamespaceRepository::new(db)
        .find_by_id(provider.namespace_id)
        .await?
        .ok_or_else(|| ExtractionError::NotFound {
            entity: "namespace",
            key: provider.namespace_id.to_string(),
        })?;
    let repository = RepositoryRepository::new(db)
        .find_by_id(provider.repository_id)
        .await?
        .ok_or_else(|| ExtractionError::NotFound {
            entity: "repository",
            key: provider.repository_id.to_string(),
        })?;
    let source = sources
        .get(&repository.provider_source)
        .ok_or_else(|| ExtractionError::SourceNotConfigured(repository.provider_source.clone()))?;

    let context = ImportContext {
        namespace: &namespace,
        provider: &provider,
        repository: &repository,
        source: source.as_ref(),
    };
    let address = context.address();

    let credential = source
        .resolve_credential(&namespace, provider.use_default_credential)
        .await?;

    let txn = db.begin().await?;
    let releases = find_new_releases(&txn, &provider, &repository, source.as_ref(), &credential)
        .await?;
    let discovered = releases.len();

    let mut outcomes = Vec::with_capacity(discovered);
    let mut imported_versions = Vec::new();
    for release in releases.iter().rev() {
        let savepoint = txn.begin().await?;
        let status = match import_version(&savepoint, &context, release).await {
            Ok(imported) => {
                savepoint.commit().await?;
                counter!("provider_versions_imported_total").increment(1);
                imported_versions.push(release.version.as_str().to_string());
                ReleaseStatus::Imported {
                    version_id: imported.version.id,
                    binaries: imported.binaries.len(),
                    documentation_pages: imported.documentation_pages,
                    rejected_assets: imported.rejected_assets,
                    latest: imported.latest,
                }
            }
            Err(err) if err.is_version_already_imported() => {
                savepoint.rollback().await?;
                info!(version = %release.version, "release already imported");
                ReleaseStatus::AlreadyExists
            }
            Err(err) => {
                savepoint.rollback().await?;
                counter!("provider_versions_failed_total").increment(1);
                error!(version = %release.version, error = %err, "release import failed");
                ReleaseStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        outcomes.push(ReleaseOutcome {
            version: release.version.as_str().to_string(),
            tag: release.tag.clone(),
            status,
        });
    }

    let latest_version = ProviderVersionRepository::new(&txn)
        .latest_version(provider.id)
        .await?
        .map(|model| model.version);
    txn.commit().await?;

    for version in &imported_versions {
        audit.record(AuditEvent::version_imported(SYSTEM_ACTOR, &address, version));
    }

    histogram!("provider_refresh_duration_ms").record(started.elapsed().as_millis() as f64);

    let report = RefreshReport {
        provider: address,
        discovered,
        outcomes,
        latest_version,
    };
    info!(
        provider = %report.provider,
        discovered,
        imported = report.imported(),
        failed = report.failed(),
        "provider refresh finished"
    );
    Ok(report)
}

/// Deletes one version of a provider, re-pointing its latest version.
pub async fn delete_version(
    db: &DatabaseConnection,
    audit: &dyn AuditSink,
    actor: &str,
    namespace: &namespace::Model,
    provider: &provider::Model,
    version: &str,
) -> Result<provider_version::Model, ExtractionError> {
    let txn = db.begin().await?;
    let versions = ProviderVersionRepository::new(&txn);
    let existing = versions
        .find_by_version(provider.id, version)
        .await?
        .ok_or_else(|| ExtractionError::NotFound {
            entity: VERSION_ENTITY,
            key: format!("{}/{}/{}", namespace.name, provider.name, version),
        })?;
    let deleted = versions.delete(existing.id).await?;
    txn.commit().await?;

    audit.record(AuditEvent::version_deleted(
        actor,
        &format!("{}/{}", namespace.name, provider.name),
        &deleted.version,
    ));
    Ok(deleted)
}
