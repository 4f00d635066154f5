//! Release artifact naming and checksum manifests.
//!
//! Every provider release publishes its files under a fixed naming scheme:
//!
//! * `{repository}_{version}_{os}_{arch}.zip` for each platform binary
//! * `{repository}_{version}_SHA256SUMS` listing the SHA-256 of every file
//! * `{repository}_{version}_SHA256SUMS.sig` with a detached signature
//! * `{repository}_{version}_manifest.json` with protocol metadata

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::provider_version_binary::{Architecture, OperatingSystem};

const BINARY_EXTENSION: &str = ".zip";

/// Why a release asset was not persisted as a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetRejectionKind {
    /// The file name does not follow `{repo}_{version}_{os}_{arch}.zip`
    Grammar,
    /// The OS token is not a supported operating system
    OperatingSystem,
    /// The architecture token is not a supported architecture
    Architecture,
    /// The checksum manifest has no entry for the file
    MissingChecksum,
    /// The downloaded bytes do not hash to the manifest entry
    ChecksumMismatch,
    /// The asset could not be downloaded
    DownloadFailed,
}

impl AssetRejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetRejectionKind::Grammar => "grammar",
            AssetRejectionKind::OperatingSystem => "operating_system",
            AssetRejectionKind::Architecture => "architecture",
            AssetRejectionKind::MissingChecksum => "missing_checksum",
            AssetRejectionKind::ChecksumMismatch => "checksum_mismatch",
            AssetRejectionKind::DownloadFailed => "download_failed",
        }
    }
}

impl fmt::Display for AssetRejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified per-asset failure. Siblings of a rejected asset still import.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, ToSchema)]
#[error("asset '{filename}' rejected ({kind}): {detail}")]
pub struct AssetRejection {
    pub filename: String,
    pub kind: AssetRejectionKind,
    pub detail: String,
}

impl AssetRejection {
    pub fn new(filename: &str, kind: AssetRejectionKind, detail: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Platform decoded from a binary file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: OperatingSystem,
    pub arch: Architecture,
}

pub fn shasums_name(repository_name: &str, version: &str) -> String {
    format!("{repository_name}_{version}_SHA256SUMS")
}

pub fn shasums_signature_name(repository_name: &str, version: &str) -> String {
    format!("{repository_name}_{version}_SHA256SUMS.sig")
}

pub fn manifest_name(repository_name: &str, version: &str) -> String {
    format!("{repository_name}_{version}_manifest.json")
}

pub fn binary_name(
    repository_name: &str,
    version: &str,
    os: OperatingSystem,
    arch: Architecture,
) -> String {
    format!("{repository_name}_{version}_{os}_{arch}{BINARY_EXTENSION}")
}

/// Whether a file name is shaped like a platform binary of this release.
///
/// Only such names are candidates for binary import; anything else attached
/// to the release (checksums, signature, manifest) is silently ignored.
pub fn is_binary_candidate(repository_name: &str, version: &str, filename: &str) -> bool {
    let prefix = format!("{repository_name}_{version}_");
    filename.starts_with(&prefix)
        && filename != shasums_name(repository_name, version)
        && filename != shasums_signature_name(repository_name, version)
        && filename != manifest_name(repository_name, version)
}

/// Decodes `{repository}_{version}_{os}_{arch}.zip` into its platform.
pub fn parse_binary_name(
    repository_name: &str,
    version: &str,
    filename: &str,
) -> Result<Platform, AssetRejection> {
    let prefix = format!("{repository_name}_{version}_");
    let platform = filename
        .strip_prefix(&prefix)
        .and_then(|rest| rest.strip_suffix(BINARY_EXTENSION))
        .ok_or_else(|| {
            AssetRejection::new(
                filename,
                AssetRejectionKind::Grammar,
                format!("expected {prefix}{{os}}_{{arch}}{BINARY_EXTENSION}"),
            )
        })?;

    let mut tokens = platform.split('_');
    let (Some(os_token), Some(arch_token), None) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(AssetRejection::new(
            filename,
            AssetRejectionKind::Grammar,
            format!("platform segment '{platform}' is not {{os}}_{{arch}}"),
        ));
    };

    let os = os_token.parse::<OperatingSystem>().map_err(|token| {
        AssetRejection::new(
            filename,
            AssetRejectionKind::OperatingSystem,
            format!("unsupported operating system '{token}'"),
        )
    })?;
    let arch = arch_token.parse::<Architecture>().map_err(|token| {
        AssetRejection::new(
            filename,
            AssetRejectionKind::Architecture,
            format!("unsupported architecture '{token}'"),
        )
    })?;

    Ok(Platform { os, arch })
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("checksum manifest is not valid UTF-8")]
    NotUtf8,
    #[error("malformed checksum manifest line {line}")]
    MalformedLine { line: usize },
}

/// Parsed `SHA256SUMS` file: file name to lowercase hex digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: HashMap<String, String>,
}

impl ChecksumManifest {
    /// Parses `sha256sum` output: `<hex>  <file>` per line, optionally with
    /// the `*` binary-mode marker in front of the file name.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        let mut entries = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (digest, filename) = line
                .split_once(char::is_whitespace)
                .ok_or(ManifestError::MalformedLine { line: index + 1 })?;
            let filename = filename.trim_start();
            let filename = filename.strip_prefix('*').unwrap_or(filename);
            if digest.len() != 64
                || !digest.chars().all(|c| c.is_ascii_hexdigit())
                || filename.is_empty()
            {
                return Err(ManifestError::MalformedLine { line: index + 1 });
            }
            entries.insert(filename.to_string(), digest.to_ascii_lowercase());
        }

        Ok(Self { entries })
    }

    pub fn checksum(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verifies downloaded bytes against the manifest, returning the digest.
    pub fn verify(&self, filename: &str, bytes: &[u8]) -> Result<String, AssetRejection> {
        let expected = self.checksum(filename).ok_or_else(|| {
            AssetRejection::new(
                filename,
                AssetRejectionKind::MissingChecksum,
                "no entry in checksum manifest",
            )
        })?;
        let actual = sha256_hex(bytes);
        if actual != expected {
            return Err(AssetRejection::new(
                filename,
                AssetRejectionKind::ChecksumMismatch,
                format!("expected {expected}, got {actual}"),
            ));
        }
        Ok(actual)
    }
}
