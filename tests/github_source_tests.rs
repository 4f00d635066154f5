use chrono::Utc;
use provider_registry::credentials::{Credential, CredentialBroker, CredentialError};
use provider_registry::models::namespace::{self, NamespaceType};
use provider_registry::models::{ReleaseArtifactMetadata, ReleaseMetadata, repository};
use provider_registry::sources::{ProviderSource, SourceError};
use provider_registry::sources::github::GithubSource;
use provider_registry::version::VersionNumber;
use serde::Deserialize;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, header_exists, method, path, query_param},
};

const APP_ID: &str = "12345";

fn app_key() -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/github-app.pem");
    std::fs::read(path).unwrap()
}

fn app_public_key() -> Vec<u8> {
    let path =
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/github-app.pub.pem");
    std::fs::read(path).unwrap()
}

#[derive(Debug, Deserialize)]
struct AssertionClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

fn repository() -> repository::Model {
    repository::Model {
        id: 1,
        provider_source: "github".to_string(),
        provider_id: "4242".to_string(),
        owner: "acme".to_string(),
        name: "terraform-provider-widget".to_string(),
        description: None,
        clone_url: "https://github.com/acme/terraform-provider-widget.git".to_string(),
        logo_url: None,
    }
}

fn namespace(namespace_type: NamespaceType) -> namespace::Model {
    namespace::Model {
        id: 1,
        name: "acme".to_string(),
        namespace_type,
        created_at: Utc::now().into(),
    }
}

fn source_with(
    server: &MockServer,
    app: bool,
    default_access_token: Option<&str>,
) -> GithubSource {
    let http = reqwest::Client::new();
    let key = app_key();
    let broker = CredentialBroker::new(
        "github",
        &server.uri(),
        http.clone(),
        app.then_some((APP_ID, key.as_slice())),
        default_access_token.map(str::to_string),
        None,
    )
    .unwrap();
    GithubSource::new("github", "https://github.com", &server.uri(), http, broker)
}

fn release_json(id: i64, version: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("v{version}"),
        "tag_name": format!("v{version}"),
        "tarball_url": format!("https://api.github.com/repos/acme/terraform-provider-widget/tarball/v{version}"),
        "published_at": "2025-01-15T12:00:00Z",
        "draft": false,
        "prerelease": false
    })
}

#[tokio::test]
async fn lists_releases_with_page_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer static-token"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([release_json(11, "1.1.0"), release_json(10, "1.0.0")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, false, Some("static-token"));
    let page = source
        .list_releases(&repository(), &Credential::from_static("static-token"), 2)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].tag_name.as_deref(), Some("v1.1.0"));
    assert_eq!(page.items[1].id, Some(10));
    assert!(!page.has_more());
}

#[tokio::test]
async fn failed_listing_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases/10/assets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let source = source_with(&server, false, Some("static-token"));
    let page = source
        .list_release_assets(&repository(), &Credential::from_static("static-token"), 10, 1)
        .await
        .unwrap();

    assert!(page.items.is_empty());
}

#[tokio::test]
async fn unknown_tag_has_no_commit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/commits/v1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sha": "a".repeat(40) })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/commits/v9.9.9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/commits/v5.0.0"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let source = source_with(&server, false, Some("static-token"));
    let credential = Credential::from_static("static-token");

    let found = source
        .get_commit_hash_by_tag(&repository(), &credential, "v1.0.0")
        .await
        .unwrap();
    assert_eq!(found, Some("a".repeat(40)));

    let missing = source
        .get_commit_hash_by_tag(&repository(), &credential, "v9.9.9")
        .await
        .unwrap();
    assert_eq!(missing, None);

    let failed = source
        .get_commit_hash_by_tag(&repository(), &credential, "v5.0.0")
        .await;
    assert!(failed.is_err());
}

#[tokio::test]
async fn downloads_only_attached_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases/assets/501"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"checksums".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let release = ReleaseMetadata {
        id: 10,
        name: "v1.0.0".to_string(),
        tag: "v1.0.0".to_string(),
        version: VersionNumber::parse("1.0.0").unwrap(),
        commit_hash: "a".repeat(40),
        archive_url: format!("{}/tarball/v1.0.0", server.uri()),
        published_at: Utc::now(),
        artifacts: vec![ReleaseArtifactMetadata {
            id: 501,
            name: "terraform-provider-widget_1.0.0_SHA256SUMS".to_string(),
            download_url: "https://github.com/acme/terraform-provider-widget/releases/download/v1.0.0/terraform-provider-widget_1.0.0_SHA256SUMS".to_string(),
        }],
    };

    let source = source_with(&server, false, Some("static-token"));
    let credential = Credential::from_static("static-token");

    let bytes = source
        .download_artifact(
            &repository(),
            &credential,
            &release,
            "terraform-provider-widget_1.0.0_SHA256SUMS",
        )
        .await
        .unwrap();
    assert_eq!(bytes.as_deref(), Some(b"checksums".as_slice()));

    let absent = source
        .download_artifact(
            &repository(),
            &credential,
            &release,
            "terraform-provider-widget_1.0.0_SHA256SUMS.sig",
        )
        .await
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn exchanges_app_assertion_for_installation_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/installation"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 99 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/installations/99/access_tokens"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "ghs_installation" })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, true, None);
    let credential = source
        .resolve_credential(&namespace(NamespaceType::GithubOrganisation), false)
        .await
        .unwrap();
    assert_eq!(credential.token(), "ghs_installation");
    assert_eq!(credential.installation_id(), Some(99));

    // The second lookup is served from the cache
    let cached = source.broker().installation_token(99).await.unwrap();
    assert_eq!(cached.token(), "ghs_installation");
    assert_eq!(source.broker().cached_installations(), 1);
}

#[tokio::test]
async fn user_namespace_without_installation_falls_back_to_default_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/acme/installation"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, true, Some("static-token"));
    let credential = source
        .resolve_credential(&namespace(NamespaceType::GithubUser), false)
        .await
        .unwrap();
    assert_eq!(credential.token(), "static-token");
    assert_eq!(credential.installation_id(), None);
}

#[tokio::test]
async fn rejected_installation_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases"))
        .and(header("authorization", "Bearer ghs_stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases"))
        .and(header("authorization", "Bearer ghs_fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([release_json(1, "1.0.0")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/installations/7/access_tokens"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "ghs_fresh" })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, true, None);
    let stale = Credential::for_installation("ghs_stale", 7);

    let page = source.list_releases(&repository(), &stale, 1).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(source.broker().cached_installations(), 1);
}

#[tokio::test]
async fn static_token_is_not_retried_on_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-provider-widget/releases"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, false, Some("static-token"));
    let page = source
        .list_releases(&repository(), &Credential::from_static("static-token"), 1)
        .await
        .unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn no_credential_configured_is_an_error() {
    let server = MockServer::start().await;
    let source = source_with(&server, false, None);

    let err = source
        .resolve_credential(&namespace(NamespaceType::GithubOrganisation), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::NotConfigured { .. }));
}

#[tokio::test]
async fn failed_installation_lookup_is_a_source_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/installation"))
        .respond_with(ResponseTemplate::new(500).set_body_string("lookup broke"))
        .expect(2)
        .mount(&server)
        .await;

    let source = source_with(&server, true, Some("static-token"));
    let organisation = namespace(NamespaceType::GithubOrganisation);

    let err = source.resolve_installation_id(&organisation).await.unwrap_err();
    assert!(matches!(
        err,
        SourceError::UnexpectedStatus { status: 500, ref body, .. } if body == "lookup broke"
    ));

    // A broken lookup is not silently replaced by the default token
    let err = source.resolve_credential(&organisation, false).await.unwrap_err();
    assert!(matches!(
        err,
        CredentialError::Source(SourceError::UnexpectedStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn failed_token_exchange_is_a_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app/installations/7/access_tokens"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_with(&server, true, None);
    let err = source.broker().installation_token(7).await.unwrap_err();
    assert!(matches!(
        err,
        CredentialError::Source(SourceError::UnexpectedStatus { status: 500, ref url, .. })
            if url.ends_with("/app/installations/7/access_tokens")
    ));
    assert_eq!(source.broker().cached_installations(), 0);
}

#[test]
fn app_assertion_is_signed_by_the_app_key() {
    let broker = CredentialBroker::new(
        "github",
        "https://api.github.com",
        reqwest::Client::new(),
        Some((APP_ID, app_key().as_slice())),
        None,
        None,
    )
    .unwrap();

    let assertion = broker.app_assertion().unwrap();
    let header = jsonwebtoken::decode_header(&assertion).unwrap();
    assert_eq!(header.alg, jsonwebtoken::Algorithm::RS256);

    let key = jsonwebtoken::DecodingKey::from_rsa_pem(&app_public_key()).unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.set_issuer(&[APP_ID]);
    validation.set_required_spec_claims(&["exp", "iat", "iss"]);
    let claims = jsonwebtoken::decode::<AssertionClaims>(&assertion, &key, &validation)
        .unwrap()
        .claims;

    assert_eq!(claims.iss, APP_ID);
    assert_eq!(claims.exp - claims.iat, 600);
    assert!((claims.iat - Utc::now().timestamp()).abs() <= 5);
}
