//! Transient release metadata
//!
//! Plain value types produced by release discovery and consumed by the
//! extractor. They never touch the database and compare structurally, so
//! discovery can be asserted against literal expectations.

use chrono::{DateTime, Utc};

use crate::version::VersionNumber;

/// A single downloadable asset attached to an upstream release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifactMetadata {
    pub id: i64,
    pub name: String,
    pub download_url: String,
}

/// An upstream release that has not been imported yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMetadata {
    /// Upstream release id
    pub id: i64,
    pub name: String,
    pub tag: String,
    pub version: VersionNumber,
    pub commit_hash: String,
    /// URL of the gzip-compressed source tarball
    pub archive_url: String,
    pub published_at: DateTime<Utc>,
    pub artifacts: Vec<ReleaseArtifactMetadata>,
}

impl ReleaseMetadata {
    pub fn beta(&self) -> bool {
        self.version.is_prerelease()
    }

    /// Finds an attached asset by exact file name.
    pub fn artifact(&self, name: &str) -> Option<&ReleaseArtifactMetadata> {
        self.artifacts.iter().find(|artifact| artifact.name == name)
    }
}
