//! # Release signature verification
//!
//! A release is trusted when its `SHA256SUMS` file carries a detached
//! signature made by one of the namespace's registered keys. Verification
//! runs over the manifest bytes exactly as downloaded.

use sea_orm::ConnectionTrait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{shasums_name, shasums_signature_name};
use crate::credentials::Credential;
use crate::gpg::{DetachedSignature, PublicKey};
use crate::models::{ReleaseMetadata, gpg_key, namespace, repository};
use crate::repositories::{GpgKeyRepository, RepositoryError};
use crate::sources::{ProviderSource, SourceError};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("release is missing required artifact {artifact}")]
    MissingArtifact { artifact: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Database(#[from] RepositoryError),
}

/// A checksum manifest together with the key that signed it.
#[derive(Debug, Clone)]
pub struct SignedManifest {
    pub key: gpg_key::Model,
    pub shasums: Vec<u8>,
}

/// Finds the namespace key that signed the release's checksum manifest.
///
/// Fails with `MissingArtifact` when the manifest or its signature is not
/// attached to the release. Returns `None` when no key verifies.
pub async fn obtain_gpg_key<C: ConnectionTrait>(
    conn: &C,
    namespace: &namespace::Model,
    repository: &repository::Model,
    release: &ReleaseMetadata,
    source: &dyn ProviderSource,
    credential: &Credential,
) -> Result<Option<gpg_key::Model>, SignatureError> {
    Ok(
        verify_release(conn, namespace, repository, release, source, credential)
            .await?
            .map(|signed| signed.key),
    )
}

/// Like [`obtain_gpg_key`], also handing back the verified manifest bytes.
#[instrument(skip_all, fields(namespace = %namespace.name, version = %release.version))]
pub async fn verify_release<C: ConnectionTrait>(
    conn: &C,
    namespace: &namespace::Model,
    repository: &repository::Model,
    release: &ReleaseMetadata,
    source: &dyn ProviderSource,
    credential: &Credential,
) -> Result<Option<SignedManifest>, SignatureError> {
    let version = release.version.as_str();
    let shasums = download_required(
        source,
        repository,
        credential,
        release,
        &shasums_name(&repository.name, version),
    )
    .await?;
    let signature_bytes = download_required(
        source,
        repository,
        credential,
        release,
        &shasums_signature_name(&repository.name, version),
    )
    .await?;

    let signature = match DetachedSignature::parse(&signature_bytes) {
        Ok(signature) => signature,
        Err(err) => {
            warn!(error = %err, "release signature cannot be parsed");
            return Ok(None);
        }
    };

    let keys = GpgKeyRepository::new(conn)
        .list_for_namespace(namespace.id)
        .await?;
    debug!(candidates = keys.len(), "verifying checksum manifest signature");

    for key in keys {
        let public_key = match PublicKey::from_armored(&key.ascii_armor) {
            Ok(public_key) => public_key,
            Err(err) => {
                warn!(gpg_key_id = key.id, error = %err, "stored key cannot be parsed, skipping");
                continue;
            }
        };
        if public_key.verify(&shasums, &signature) {
            info!(gpg_key_id = key.id, key_id = key.key_id(), "release signature verified");
            return Ok(Some(SignedManifest { key, shasums }));
        }
    }

    warn!("no namespace key verifies the release signature");
    Ok(None)
}

async fn download_required(
    source: &dyn ProviderSource,
    repository: &repository::Model,
    credential: &Credential,
    release: &ReleaseMetadata,
    artifact: &str,
) -> Result<Vec<u8>, SignatureError> {
    source
        .download_artifact(repository, credential, release, artifact)
        .await?
        .ok_or_else(|| SignatureError::MissingArtifact {
            artifact: artifact.to_string(),
        })
}
