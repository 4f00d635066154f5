//! # Data Models
//!
//! SeaORM entities for the registry tables, plus the transient release
//! metadata passed between discovery and extraction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod gpg_key;
pub mod namespace;
pub mod provider;
pub mod provider_version;
pub mod provider_version_binary;
pub mod provider_version_documentation;
pub mod release;
pub mod repository;

pub use gpg_key::Entity as GpgKey;
pub use namespace::Entity as Namespace;
pub use provider::Entity as Provider;
pub use provider_version::Entity as ProviderVersion;
pub use provider_version_binary::Entity as ProviderVersionBinary;
pub use provider_version_documentation::Entity as ProviderVersionDocumentation;
pub use release::{ReleaseArtifactMetadata, ReleaseMetadata};
pub use repository::Entity as Repository;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "provider-registry".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
