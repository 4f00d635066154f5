//! # Upstream credentials
//!
//! Resolves the bearer credential used to talk to an upstream host. A source
//! configured as an app mints a short-lived RS256 assertion and exchanges it
//! for an installation-scoped token; otherwise a statically configured token
//! is used.
//!
//! Installation tokens are cached per installation id until the process
//! restarts or a caller invalidates them (typically after a 401).

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ProviderSourceConfig;
use crate::sources::SourceError;

/// Lifetime of the app assertion, the maximum GitHub accepts.
const ASSERTION_TTL_SECONDS: i64 = 600;
const TOKEN_CACHE_CAPACITY: usize = 256;
pub(crate) const USER_AGENT: &str = concat!("provider-registry/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Neither an app installation nor a default credential is available.
    /// Retrying cannot help until configuration changes.
    #[error("no credential configured for provider source '{source_name}'")]
    NotConfigured { source_name: String },

    #[error("failed to sign app assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("failed to read app private key {path}: {source}")]
    PrivateKey {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl CredentialError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialError::Source(err) if err.is_retryable())
    }
}

/// A bearer token for the upstream host. The token is wiped from memory on drop
/// and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    token: String,
    #[zeroize(skip)]
    installation_id: Option<i64>,
}

impl Credential {
    /// A statically configured token not tied to an installation.
    pub fn from_static(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            installation_id: None,
        }
    }

    pub fn for_installation(token: impl Into<String>, installation_id: i64) -> Self {
        Self {
            token: token.into(),
            installation_id: Some(installation_id),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn installation_id(&self) -> Option<i64> {
        self.installation_id
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

struct AppIdentity {
    app_id: String,
    key: EncodingKey,
}

/// Mints, exchanges and caches credentials for one provider source.
pub struct CredentialBroker {
    source_name: String,
    api_url: String,
    http: reqwest::Client,
    app: Option<AppIdentity>,
    default_access_token: Option<String>,
    default_installation_id: Option<i64>,
    cache: Mutex<LruCache<i64, Credential>>,
}

impl CredentialBroker {
    /// Builds a broker from source configuration, reading the app key from disk.
    pub fn from_config(
        config: &ProviderSourceConfig,
        http: reqwest::Client,
    ) -> Result<Self, CredentialError> {
        let app = match (&config.app_id, &config.private_key_path) {
            (Some(app_id), Some(path)) => {
                let pem = read_private_key(path)?;
                Some((app_id.clone(), pem))
            }
            _ => None,
        };

        Self::new(
            &config.name,
            &config.api_url,
            http,
            app.as_ref().map(|(id, pem)| (id.as_str(), pem.as_slice())),
            config.default_access_token.clone(),
            config.default_installation_id,
        )
    }

    pub fn new(
        source_name: &str,
        api_url: &str,
        http: reqwest::Client,
        app: Option<(&str, &[u8])>,
        default_access_token: Option<String>,
        default_installation_id: Option<i64>,
    ) -> Result<Self, CredentialError> {
        let app = app
            .map(|(app_id, pem)| -> Result<AppIdentity, CredentialError> {
                Ok(AppIdentity {
                    app_id: app_id.to_string(),
                    key: EncodingKey::from_rsa_pem(pem)?,
                })
            })
            .transpose()?;

        let capacity = NonZeroUsize::new(TOKEN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            source_name: source_name.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            http,
            app,
            default_access_token,
            default_installation_id,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn has_app(&self) -> bool {
        self.app.is_some()
    }

    /// Signs a short-lived app assertion (`iat = now`, `exp = now + 600s`).
    pub fn app_assertion(&self) -> Result<String, CredentialError> {
        let app = self.app.as_ref().ok_or_else(|| CredentialError::NotConfigured {
            source_name: self.source_name.clone(),
        })?;
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now,
            exp: now + ASSERTION_TTL_SECONDS,
            iss: app.app_id.clone(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &app.key,
        )?)
    }

    /// Resolves the credential for a provider.
    ///
    /// An installation token is used when the provider does not force the
    /// default credential and an installation was found for its namespace.
    /// Otherwise the default access token, then the default installation.
    #[instrument(skip(self), fields(source = %self.source_name))]
    pub async fn resolve(
        &self,
        installation_id: Option<i64>,
        use_default: bool,
    ) -> Result<Credential, CredentialError> {
        if !use_default && let Some(id) = installation_id {
            return self.installation_token(id).await;
        }

        if let Some(token) = &self.default_access_token {
            debug!("using default access token");
            return Ok(Credential::from_static(token.clone()));
        }

        if let Some(id) = self.default_installation_id {
            return self.installation_token(id).await;
        }

        Err(CredentialError::NotConfigured {
            source_name: self.source_name.clone(),
        })
    }

    /// Returns a cached installation token or exchanges a fresh assertion for one.
    pub async fn installation_token(&self, installation_id: i64) -> Result<Credential, CredentialError> {
        if let Some(cached) = self.lock_cache().get(&installation_id) {
            return Ok(cached.clone());
        }

        let assertion = self.app_assertion()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {assertion}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(SourceError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url,
                body: truncate(&body),
            }
            .into());
        }

        let payload: InstallationTokenResponse =
            response.json().await.map_err(SourceError::from)?;
        let credential = Credential::for_installation(payload.token, installation_id);
        self.lock_cache().put(installation_id, credential.clone());
        info!(installation_id, "minted installation token");

        Ok(credential)
    }

    /// Drops the cached token for an installation so the next call mints a new one.
    pub fn invalidate(&self, installation_id: i64) {
        self.lock_cache().pop(&installation_id);
    }

    pub fn clear(&self) {
        self.lock_cache().clear();
    }

    pub fn cached_installations(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LruCache<i64, Credential>> {
        self.cache
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn read_private_key(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::PrivateKey {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn truncate(body: &str) -> String {
    if body.chars().count() > 200 {
        let truncated: String = body.chars().take(200).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}
