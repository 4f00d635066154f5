mod test_utils;

use std::sync::Arc;

use provider_registry::artifacts::AssetRejectionKind;
use provider_registry::audit::{AuditAction, MemoryAuditSink};
use provider_registry::discovery::find_new_releases;
use provider_registry::extractor::{
    ExtractionError, ImportContext, ReleaseStatus, delete_version, import_version,
    refresh_provider,
};
use provider_registry::models::provider_version_documentation::DocumentationType;
use provider_registry::repositories::{
    DocumentationFilter, GpgKeyRepository, ProviderRepository, ProviderVersionBinaryRepository,
    ProviderVersionDocumentationRepository, ProviderVersionRepository, VERSION_ENTITY,
};
use provider_registry::sources::ProviderSourceRegistry;
use sea_orm::DatabaseConnection;
use test_utils::{
    FIXTURE_VERSIONS, FakeRelease, FakeSource, REPOSITORY_NAME, SOURCE_NAME, Seeded,
    fixture_binary, fixture_key, seed_provider, setup_test_db, tarball,
};

/// A fake host serving every fixture version, pushed in version order.
fn fixture_source() -> FakeSource {
    let mut source = FakeSource::new(SOURCE_NAME);
    for (index, version) in FIXTURE_VERSIONS.iter().enumerate() {
        source.push(FakeRelease::from_fixtures(index as i64 + 1, version));
    }
    source
}

fn registry_for(source: Arc<FakeSource>) -> ProviderSourceRegistry {
    let mut registry = ProviderSourceRegistry::new();
    registry.register(source);
    registry
}

async fn latest_version_of(db: &DatabaseConnection, seeded: &Seeded) -> Option<String> {
    let provider = ProviderRepository::new(db)
        .find_by_id(seeded.provider.id)
        .await
        .unwrap()
        .unwrap();
    let latest_id = provider.latest_version_id?;
    ProviderVersionRepository::new(db)
        .find_by_id(latest_id)
        .await
        .unwrap()
        .map(|version| version.version)
}

async fn import_single(
    db: &DatabaseConnection,
    seeded: &Seeded,
    source: &FakeSource,
) -> Result<provider_registry::extractor::ImportedVersion, ExtractionError> {
    let credential = provider_registry::credentials::Credential::from_static("fake-token");
    let releases = find_new_releases(db, &seeded.provider, &seeded.repository, source, &credential)
        .await
        .unwrap();
    let context = ImportContext {
        namespace: &seeded.namespace,
        provider: &seeded.provider,
        repository: &seeded.repository,
        source,
    };
    import_version(db, &context, &releases[0]).await
}

#[tokio::test]
async fn refresh_imports_every_version_and_tracks_latest() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();
    let source = Arc::new(fixture_source());
    let registry = registry_for(source.clone());
    let audit = MemoryAuditSink::default();

    let report = refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();

    assert_eq!(report.provider, "acme/multiple-versions");
    assert_eq!(report.discovered, 6);
    assert_eq!(report.imported(), 6);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.latest_version.as_deref(), Some("2.0.1"));

    // Imported oldest first
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.version.as_str()).collect();
    assert_eq!(order, FIXTURE_VERSIONS.to_vec());

    assert_eq!(latest_version_of(&db, &seeded).await.as_deref(), Some("2.0.1"));

    let versions = ProviderVersionRepository::new(&db)
        .list_for_provider(seeded.provider.id)
        .await
        .unwrap();
    assert_eq!(versions.len(), 6);
    for version in &versions {
        assert_eq!(version.gpg_key_id, seeded.key.id);
        assert_eq!(version.protocols(), vec!["5.0".to_string()]);
        assert_eq!(version.beta, version.version == "1.1.0-beta");
        assert_eq!(version.git_tag, format!("v{}", version.version));

        let binaries = ProviderVersionBinaryRepository::new(&db)
            .list_for_version(version.id)
            .await
            .unwrap();
        assert_eq!(binaries.len(), 2);
        for binary in binaries {
            let expected = provider_registry::artifacts::sha256_hex(&fixture_binary(
                &version.version,
                binary.operating_system.as_str(),
                binary.architecture.as_str(),
            ));
            assert_eq!(binary.checksum, expected);
        }
    }

    let events = audit.events();
    assert_eq!(events.len(), 6);
    assert!(
        events
            .iter()
            .all(|event| event.action == AuditAction::ProviderVersionImported)
    );
    assert_eq!(events[5].object_id, "acme/multiple-versions/2.0.1");
}

#[tokio::test]
async fn second_refresh_discovers_nothing() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();
    let source = Arc::new(fixture_source());
    let registry = registry_for(source.clone());
    let audit = MemoryAuditSink::default();

    refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();
    let listings_after_first = source.listings();

    let report = refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();

    assert_eq!(report.discovered, 0);
    assert!(report.outcomes.is_empty());
    assert_eq!(report.latest_version.as_deref(), Some("2.0.1"));
    assert_eq!(source.listings(), listings_after_first + 1);
}

#[tokio::test]
async fn importing_the_same_version_twice_is_already_exists() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();
    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(FakeRelease::from_fixtures(1, "1.0.0"));

    let first = import_single(&db, &seeded, &source).await.unwrap();
    assert_eq!(first.binaries.len(), 2);
    assert!(first.latest);

    let credential = provider_registry::credentials::Credential::from_static("fake-token");
    let release = provider_registry::models::ReleaseMetadata {
        id: 1,
        name: "v1.0.0".to_string(),
        tag: "v1.0.0".to_string(),
        version: provider_registry::version::VersionNumber::parse("1.0.0").unwrap(),
        commit_hash: "f".repeat(40),
        archive_url: "https://api.example.com/tarball/v1.0.0".to_string(),
        published_at: test_utils::published(2),
        artifacts: source_artifacts(&source, &seeded, &credential).await,
    };
    let context = ImportContext {
        namespace: &seeded.namespace,
        provider: &seeded.provider,
        repository: &seeded.repository,
        source: &source,
    };
    let err = import_version(&db, &context, &release).await.unwrap_err();
    assert!(err.is_version_already_imported(), "unexpected error: {err}");

    let stored = ProviderVersionRepository::new(&db)
        .find_by_version(seeded.provider.id, "1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, first.version.id);
    assert_eq!(stored.commit_hash, first.version.commit_hash);
    let binaries = ProviderVersionBinaryRepository::new(&db)
        .list_for_version(stored.id)
        .await
        .unwrap();
    assert_eq!(binaries.len(), 2);
}

async fn source_artifacts(
    source: &FakeSource,
    seeded: &Seeded,
    credential: &provider_registry::credentials::Credential,
) -> Vec<provider_registry::models::ReleaseArtifactMetadata> {
    use provider_registry::sources::ProviderSource;
    source
        .list_release_assets(&seeded.repository, credential, 1, 1)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|asset| provider_registry::models::ReleaseArtifactMetadata {
            id: asset.id,
            name: asset.name,
            download_url: asset.browser_download_url,
        })
        .collect()
}

#[tokio::test]
async fn release_signed_by_a_foreign_key_is_untrusted() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    // A second namespace owns the fixture key; this one only knows `other`
    let other_namespace = provider_registry::repositories::NamespaceRepository::new(&db)
        .create(
            "foreign",
            provider_registry::models::namespace::NamespaceType::GithubUser,
        )
        .await
        .unwrap();
    let (armor, fingerprint) = fixture_key("other");
    GpgKeyRepository::new(&db)
        .create(other_namespace.id, &armor, &fingerprint)
        .await
        .unwrap();

    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(FakeRelease::from_fixtures(1, "1.0.0"));
    let context_namespace = other_namespace;
    let credential = provider_registry::credentials::Credential::from_static("fake-token");
    let releases = find_new_releases(
        &db,
        &seeded.provider,
        &seeded.repository,
        &source,
        &credential,
    )
    .await
    .unwrap();
    let context = ImportContext {
        namespace: &context_namespace,
        provider: &seeded.provider,
        repository: &seeded.repository,
        source: &source,
    };

    let err = import_version(&db, &context, &releases[0]).await.unwrap_err();
    assert!(matches!(err, ExtractionError::UntrustedRelease { ref version } if version == "1.0.0"));
    assert!(
        !ProviderVersionRepository::new(&db)
            .exists(seeded.provider.id, "1.0.0")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn release_without_signature_is_missing_artifact() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    let mut release = FakeRelease::from_fixtures(1, "1.0.0");
    let signature = format!("{REPOSITORY_NAME}_1.0.0_SHA256SUMS.sig");
    release.assets.retain(|asset| asset.name != signature);
    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(release);

    let err = import_single(&db, &seeded, &source).await.unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::MissingArtifact { ref artifact } if *artifact == signature
    ));
}

#[tokio::test]
async fn checksum_mismatch_rejects_only_that_binary() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    let mut release = FakeRelease::from_fixtures(1, "1.0.0");
    release.replace_file(
        &format!("{REPOSITORY_NAME}_1.0.0_linux_amd64.zip"),
        b"tampered".to_vec(),
    );
    release.add_file(
        &format!("{REPOSITORY_NAME}_1.0.0_linux_386.zip"),
        fixture_binary("1.0.0", "linux", "386"),
    );
    release.add_file(&format!("{REPOSITORY_NAME}_1.0.0_plan9_amd64.zip"), Vec::new());
    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(release);

    let imported = import_single(&db, &seeded, &source).await.unwrap();

    assert_eq!(imported.binaries.len(), 1);
    assert_eq!(imported.binaries[0].operating_system.as_str(), "darwin");

    let mut kinds: Vec<(String, AssetRejectionKind)> = imported
        .rejected_assets
        .iter()
        .map(|rejection| (rejection.filename.clone(), rejection.kind))
        .collect();
    kinds.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        kinds,
        vec![
            (
                format!("{REPOSITORY_NAME}_1.0.0_linux_386.zip"),
                AssetRejectionKind::MissingChecksum
            ),
            (
                format!("{REPOSITORY_NAME}_1.0.0_linux_amd64.zip"),
                AssetRejectionKind::ChecksumMismatch
            ),
            (
                format!("{REPOSITORY_NAME}_1.0.0_plan9_amd64.zip"),
                AssetRejectionKind::OperatingSystem
            ),
        ]
    );
}

#[tokio::test]
async fn failing_release_rolls_back_alone() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    let mut source = FakeSource::new(SOURCE_NAME);
    for (index, version) in FIXTURE_VERSIONS.iter().enumerate() {
        let mut release = FakeRelease::from_fixtures(index as i64 + 1, version);
        if *version == "1.5.0" {
            // Signature of another release: verification fails
            let foreign = FakeRelease::from_fixtures(99, "2.0.0");
            let signature = format!("{REPOSITORY_NAME}_1.5.0_SHA256SUMS.sig");
            let foreign_signature = format!("{REPOSITORY_NAME}_2.0.0_SHA256SUMS.sig");
            release.replace_file(&signature, foreign.files[&foreign_signature].clone());
        }
        source.push(release);
    }
    let source = Arc::new(source);
    let registry = registry_for(source.clone());
    let audit = MemoryAuditSink::default();

    let report = refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();

    assert_eq!(report.imported(), 5);
    assert_eq!(report.failed(), 1);
    let failed = report
        .outcomes
        .iter()
        .find(|outcome| outcome.version == "1.5.0")
        .unwrap();
    assert!(matches!(failed.status, ReleaseStatus::Failed { .. }));
    assert_eq!(report.latest_version.as_deref(), Some("2.0.1"));

    let versions = ProviderVersionRepository::new(&db);
    assert!(!versions.exists(seeded.provider.id, "1.5.0").await.unwrap());
    assert!(versions.exists(seeded.provider.id, "1.1.0").await.unwrap());
    assert!(versions.exists(seeded.provider.id, "2.0.0").await.unwrap());
    assert_eq!(audit.events().len(), 5);
}

#[tokio::test]
async fn documentation_is_extracted_from_the_source_archive() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    let archive = tarball(
        "acme-terraform-provider-multiple-versions-abc1234",
        &[
            (
                "docs/index.md",
                "---\npage_title: \"Provider: Multiple Versions\"\n---\n# Overview\n",
            ),
            (
                "docs/resources/widget.md",
                "---\nsubcategory: \"Widgets\"\ndescription: |-\n  Manages a widget.\n---\n# widget\n",
            ),
            ("docs/data-sources/widget.md", "# widget data source\n"),
            ("main.go", "package main\n"),
        ],
    );
    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(FakeRelease::from_fixtures(1, "1.0.0").with_archive(archive));

    let imported = import_single(&db, &seeded, &source).await.unwrap();
    assert_eq!(imported.documentation_pages, 3);

    let docs = ProviderVersionDocumentationRepository::new(&db);
    let resources = docs
        .list(&DocumentationFilter {
            provider_version_id: imported.version.id,
            documentation_type: Some(DocumentationType::Resource),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].slug, "widget");
    assert_eq!(resources[0].subcategory.as_deref(), Some("Widgets"));
    assert_eq!(resources[0].description.as_deref(), Some("Manages a widget."));
    assert_eq!(resources[0].language, "hcl");

    let all = docs
        .list(&DocumentationFilter {
            provider_version_id: imported.version.id,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].title, "Provider: Multiple Versions");
}

#[tokio::test]
async fn colliding_documentation_slugs_do_not_block_the_release() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();

    let archive = tarball(
        "acme-terraform-provider-multiple-versions-abc1234",
        &[
            ("website/docs/r/widget.html.markdown", "# widget\n"),
            ("website/docs/r/widget.html.md", "# widget again\n"),
        ],
    );
    let mut source = FakeSource::new(SOURCE_NAME);
    source.push(FakeRelease::from_fixtures(1, "1.0.0").with_archive(archive));
    let registry = registry_for(Arc::new(source));
    let audit = MemoryAuditSink::default();

    let report = refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();
    assert_eq!(report.imported(), 1);
    assert_eq!(report.failed(), 0);

    let version = ProviderVersionRepository::new(&db)
        .find_by_version(seeded.provider.id, "1.0.0")
        .await
        .unwrap()
        .expect("release is stored");
    let resources = ProviderVersionDocumentationRepository::new(&db)
        .list(&DocumentationFilter {
            provider_version_id: version.id,
            documentation_type: Some(DocumentationType::Resource),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].filename, "widget.html.markdown");
}

#[test]
fn only_version_conflicts_count_as_already_imported() {
    let version = ExtractionError::AlreadyExists {
        entity: VERSION_ENTITY,
        key: "1@1.0.0".to_string(),
    };
    assert!(version.is_version_already_imported());

    for entity in ["provider version binary", "documentation page"] {
        let other = ExtractionError::AlreadyExists {
            entity,
            key: "1".to_string(),
        };
        assert!(!other.is_version_already_imported(), "{entity}");
    }
}

#[tokio::test]
async fn deleting_a_version_cascades_and_repoints_latest() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, SOURCE_NAME).await.unwrap();
    let source = Arc::new(fixture_source());
    let registry = registry_for(source.clone());
    let audit = MemoryAuditSink::default();
    refresh_provider(&db, &registry, &audit, seeded.provider.id)
        .await
        .unwrap();

    let deleted = delete_version(
        &db,
        &audit,
        "operator",
        &seeded.namespace,
        &seeded.provider,
        "2.0.1",
    )
    .await
    .unwrap();

    assert_eq!(deleted.version, "2.0.1");
    assert_eq!(latest_version_of(&db, &seeded).await.as_deref(), Some("2.0.0"));
    assert!(
        ProviderVersionBinaryRepository::new(&db)
            .list_for_version(deleted.id)
            .await
            .unwrap()
            .is_empty()
    );

    let last = audit.events().pop().unwrap();
    assert_eq!(last.action, AuditAction::ProviderVersionDeleted);
    assert_eq!(last.actor, "operator");

    let err = delete_version(
        &db,
        &audit,
        "operator",
        &seeded.namespace,
        &seeded.provider,
        "2.0.1",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ExtractionError::NotFound { .. }));
}

#[tokio::test]
async fn refresh_of_an_unconfigured_source_fails() {
    let db = setup_test_db().await.unwrap();
    let seeded = seed_provider(&db, "gitlab-internal").await.unwrap();
    let registry = registry_for(Arc::new(fixture_source()));

    let err = refresh_provider(&db, &registry, &MemoryAuditSink::default(), seeded.provider.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::SourceNotConfigured(ref name) if name == "gitlab-internal"));
}
