//! Test utilities shared by the integration tests.
//!
//! In-memory SQLite with migrations, seed helpers for the rows ingestion
//! expects to exist, fixture loaders, and an in-memory [`FakeSource`] that
//! stands in for an upstream host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use migration::{Migrator, MigratorTrait};
use provider_registry::credentials::{Credential, CredentialError};
use provider_registry::models::namespace::NamespaceType;
use provider_registry::models::provider::ProviderTier;
use provider_registry::models::{ReleaseMetadata, gpg_key, namespace, provider, repository};
use provider_registry::repositories::{
    GpgKeyRepository, NamespaceRepository, NewProvider, NewRepository, ProviderRepository,
    RepositoryRepository,
};
use provider_registry::sources::{
    PAGE_SIZE, Page, ProviderSource, SourceError, UpstreamAsset, UpstreamRelease,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub const SOURCE_NAME: &str = "github";
pub const REPOSITORY_NAME: &str = "terraform-provider-multiple-versions";
pub const NAMESPACE_NAME: &str = "acme";
pub const PROVIDER_NAME: &str = "multiple-versions";

/// Versions with signed fixtures under `tests/fixtures/releases`.
pub const FIXTURE_VERSIONS: [&str; 6] = ["1.0.0", "1.1.0", "1.1.0-beta", "1.5.0", "2.0.0", "2.0.1"];

/// Platforms every fixture release ships.
pub const FIXTURE_PLATFORMS: [(&str, &str); 2] = [("linux", "amd64"), ("darwin", "arm64")];

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// Foreign keys stay enforced so cascades behave as in Postgres.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

pub fn fixture_bytes(relative: &str) -> Vec<u8> {
    std::fs::read(fixture_path(relative)).unwrap()
}

pub fn fixture_text(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative)).unwrap()
}

/// Armored public key and fingerprint of a fixture key (`rsa`, `ed25519`,
/// `subkey` or `other`).
pub fn fixture_key(name: &str) -> (String, String) {
    (
        fixture_text(&format!("gpg/{name}.pub.asc")),
        fixture_text(&format!("gpg/{name}.fingerprint")).trim().to_string(),
    )
}

/// Content of the fake binary whose digest the fixture manifests carry.
pub fn fixture_binary(version: &str, os: &str, arch: &str) -> Vec<u8> {
    format!("fake provider binary {version} {os} {arch}\n").into_bytes()
}

/// Builds a gzip-compressed tarball with every path below `root/`.
pub fn tarball(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{path}"), content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Rows a provider needs before its releases can be imported.
pub struct Seeded {
    pub namespace: namespace::Model,
    pub repository: repository::Model,
    pub provider: provider::Model,
    pub key: gpg_key::Model,
}

/// Seeds a namespace with the fixture signing key, an upstream repository
/// on `source_name` and a provider backed by it.
pub async fn seed_provider(db: &DatabaseConnection, source_name: &str) -> Result<Seeded> {
    let namespace = NamespaceRepository::new(db)
        .create(NAMESPACE_NAME, NamespaceType::GithubOrganisation)
        .await?;
    let (armor, fingerprint) = fixture_key("rsa");
    let key = GpgKeyRepository::new(db)
        .create(namespace.id, &armor, &fingerprint)
        .await?;
    let repository = RepositoryRepository::new(db)
        .create(NewRepository {
            provider_source: source_name.to_string(),
            provider_id: "4242".to_string(),
            owner: NAMESPACE_NAME.to_string(),
            name: REPOSITORY_NAME.to_string(),
            description: Some("Provider with many versions".to_string()),
            clone_url: format!("https://github.com/{NAMESPACE_NAME}/{REPOSITORY_NAME}.git"),
            logo_url: None,
        })
        .await?;
    let provider = ProviderRepository::new(db)
        .create(NewProvider {
            namespace_id: namespace.id,
            name: PROVIDER_NAME.to_string(),
            tier: ProviderTier::Community,
            description: None,
            category_id: None,
            repository_id: repository.id,
            use_default_credential: true,
        })
        .await?;

    Ok(Seeded {
        namespace,
        repository,
        provider,
        key,
    })
}

pub fn published(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
}

/// A release the fake host serves, with its commit, assets and files.
#[derive(Debug, Clone)]
pub struct FakeRelease {
    pub upstream: UpstreamRelease,
    pub commit: Option<String>,
    pub assets: Vec<UpstreamAsset>,
    pub files: HashMap<String, Vec<u8>>,
    pub archive: Option<Vec<u8>>,
}

impl FakeRelease {
    /// A well-formed release with no assets.
    pub fn bare(id: i64, version: &str) -> Self {
        Self {
            upstream: UpstreamRelease {
                id: Some(id),
                name: Some(format!("v{version}")),
                tag_name: Some(format!("v{version}")),
                tarball_url: Some(format!("https://api.example.com/tarball/v{version}")),
                published_at: Some(published(1)),
                draft: false,
                prerelease: version.contains('-'),
            },
            commit: Some(format!("{id:040x}")),
            assets: Vec::new(),
            files: HashMap::new(),
            archive: None,
        }
    }

    /// A release built from the signed fixtures of `version`.
    pub fn from_fixtures(id: i64, version: &str) -> Self {
        let mut release = Self::bare(id, version);
        let directory = format!("releases/{version}");
        for name in [
            format!("{REPOSITORY_NAME}_{version}_SHA256SUMS"),
            format!("{REPOSITORY_NAME}_{version}_SHA256SUMS.sig"),
            format!("{REPOSITORY_NAME}_{version}_manifest.json"),
        ] {
            let bytes = fixture_bytes(&format!("{directory}/{name}"));
            release.add_file(&name, bytes);
        }
        for (os, arch) in FIXTURE_PLATFORMS {
            release.add_file(
                &format!("{REPOSITORY_NAME}_{version}_{os}_{arch}.zip"),
                fixture_binary(version, os, arch),
            );
        }
        release
    }

    pub fn add_file(&mut self, name: &str, bytes: Vec<u8>) {
        let id = self.upstream.id.unwrap_or_default() * 1000 + self.assets.len() as i64 + 1;
        self.assets.push(UpstreamAsset {
            id,
            name: name.to_string(),
            browser_download_url: format!("https://downloads.example.com/{id}/{name}"),
        });
        self.files.insert(name.to_string(), bytes);
    }

    /// Serves `bytes` under a file name without listing it as an asset.
    pub fn replace_file(&mut self, name: &str, bytes: Vec<u8>) {
        self.files.insert(name.to_string(), bytes);
    }

    pub fn with_archive(mut self, archive: Vec<u8>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn tag(&self) -> String {
        self.upstream.tag_name.clone().unwrap_or_default()
    }
}

/// In-memory upstream host. Releases are listed newest-first, in the
/// reverse order they were pushed.
pub struct FakeSource {
    name: String,
    releases: Vec<FakeRelease>,
    pub release_listings: AtomicUsize,
    pub credential_resolutions: AtomicUsize,
}

impl FakeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            releases: Vec::new(),
            release_listings: AtomicUsize::new(0),
            credential_resolutions: AtomicUsize::new(0),
        }
    }

    /// Adds a release newer than every release pushed before it.
    pub fn push(&mut self, release: FakeRelease) -> &mut Self {
        self.releases.insert(0, release);
        self
    }

    pub fn listings(&self) -> usize {
        self.release_listings.load(Ordering::SeqCst)
    }

    fn find(&self, predicate: impl Fn(&FakeRelease) -> bool) -> Option<&FakeRelease> {
        self.releases.iter().find(|release| predicate(release))
    }
}

fn page_of<T: Clone>(items: &[T], page: u32) -> Page<T> {
    let start = (page.saturating_sub(1) as usize) * PAGE_SIZE;
    if start >= items.len() {
        return Page::empty();
    }
    let end = (start + PAGE_SIZE).min(items.len());
    Page::new(items[start..end].to_vec())
}

#[async_trait]
impl ProviderSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_releases(
        &self,
        _repository: &repository::Model,
        _credential: &Credential,
        page: u32,
    ) -> Result<Page<UpstreamRelease>, SourceError> {
        self.release_listings.fetch_add(1, Ordering::SeqCst);
        let upstream: Vec<UpstreamRelease> = self
            .releases
            .iter()
            .map(|release| release.upstream.clone())
            .collect();
        Ok(page_of(&upstream, page))
    }

    async fn list_release_assets(
        &self,
        _repository: &repository::Model,
        _credential: &Credential,
        release_id: i64,
        page: u32,
    ) -> Result<Page<UpstreamAsset>, SourceError> {
        Ok(self
            .find(|release| release.upstream.id == Some(release_id))
            .map(|release| page_of(&release.assets, page))
            .unwrap_or_else(Page::empty))
    }

    async fn get_commit_hash_by_tag(
        &self,
        _repository: &repository::Model,
        _credential: &Credential,
        tag: &str,
    ) -> Result<Option<String>, SourceError> {
        Ok(self
            .find(|release| release.upstream.tag_name.as_deref() == Some(tag))
            .and_then(|release| release.commit.clone()))
    }

    async fn download_artifact(
        &self,
        _repository: &repository::Model,
        _credential: &Credential,
        release: &ReleaseMetadata,
        artifact_name: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        if release.artifact(artifact_name).is_none() {
            return Ok(None);
        }
        Ok(self
            .find(|candidate| candidate.upstream.id == Some(release.id))
            .and_then(|candidate| candidate.files.get(artifact_name).cloned()))
    }

    async fn download_archive(
        &self,
        _repository: &repository::Model,
        _credential: &Credential,
        archive_url: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self
            .find(|release| release.upstream.tarball_url.as_deref() == Some(archive_url))
            .and_then(|release| release.archive.clone()))
    }

    async fn resolve_installation_id(
        &self,
        _namespace: &namespace::Model,
    ) -> Result<Option<i64>, SourceError> {
        Ok(None)
    }

    async fn resolve_credential(
        &self,
        _namespace: &namespace::Model,
        _use_default: bool,
    ) -> Result<Credential, CredentialError> {
        self.credential_resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(Credential::from_static("fake-token"))
    }

    fn invalidate_credential(&self, _credential: &Credential) {}

    fn public_url(
        &self,
        repository: &repository::Model,
        version: &str,
        artifact_name: &str,
    ) -> String {
        format!(
            "https://github.com/{}/{}/releases/download/v{}/{}",
            repository.owner, repository.name, version, artifact_name
        )
    }
}
