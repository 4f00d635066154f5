//! Semantic version numbers for provider releases.
//!
//! Versions follow `MAJOR.MINOR.PATCH[-suffix]`. Git tags carry a leading
//! `v`. Leading zeros in numeric parts are accepted and compared numerically,
//! so `01.01.01` orders equal to `1.1.1` while keeping its original text.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version format: '{0}'")]
    InvalidFormat(String),
    #[error("git tag '{0}' does not start with 'v'")]
    MissingTagPrefix(String),
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)(?:-([0-9A-Za-z][0-9A-Za-z.\-]*))?$")
            .expect("static version pattern")
    })
}

/// Parsed semantic version. Keeps the original text for persistence.
#[derive(Debug, Clone)]
pub struct VersionNumber {
    raw: String,
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<String>,
}

impl VersionNumber {
    /// Parses a bare version such as `1.2.3` or `1.2.3-alpha`.
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let captures = version_pattern()
            .captures(value)
            .ok_or_else(|| VersionError::InvalidFormat(value.to_string()))?;

        let number = |index: usize| -> Result<u64, VersionError> {
            captures
                .get(index)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidFormat(value.to_string()))
        };

        Ok(Self {
            raw: value.to_string(),
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            prerelease: captures.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// Parses a git tag of the form `vMAJOR.MINOR.PATCH[-suffix]`.
    pub fn from_tag(tag: &str) -> Result<Self, VersionError> {
        let bare = tag
            .strip_prefix('v')
            .ok_or_else(|| VersionError::MissingTagPrefix(tag.to_string()))?;
        Self::parse(bare)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    /// Beta releases are exactly the ones with a prerelease suffix.
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionNumber {}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // A release sorts above any of its prereleases
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl FromStr for VersionNumber {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
