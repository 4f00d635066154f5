//! Provider version repository
//!
//! Version rows are written once by the extractor. Afterwards only the
//! publish timestamp and protocol list may change, and deleting a version
//! cascades to its binaries and documentation. Both paths keep the owning
//! provider's latest-version pointer correct.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use tracing::{debug, warn};

use super::{ProviderRepository, RepositoryError, insert_error};
use crate::models::provider_version::{self, Entity as ProviderVersion};
use crate::version::VersionNumber;

/// Entity name carried by errors about version rows.
pub const VERSION_ENTITY: &str = "provider version";

/// Fields of a provider version row before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProviderVersion {
    pub provider_id: i32,
    pub version: VersionNumber,
    pub git_tag: String,
    pub commit_hash: String,
    pub published_at: DateTime<Utc>,
    pub gpg_key_id: i32,
    pub protocol_versions: Vec<String>,
    pub extraction_version: i32,
}

/// Mutable attributes of an existing version. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionAttributes {
    pub published_at: Option<DateTime<Utc>>,
    pub protocol_versions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderVersionRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProviderVersionRepository<'a, C> {
    /// Creates a new ProviderVersionRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new ProviderVersionRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(
        &self,
        id: i32,
    ) -> Result<Option<provider_version::Model>, RepositoryError> {
        Ok(ProviderVersion::find_by_id(id).one(self.conn).await?)
    }

    pub async fn find_by_version(
        &self,
        provider_id: i32,
        version: &str,
    ) -> Result<Option<provider_version::Model>, RepositoryError> {
        Ok(ProviderVersion::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .filter(provider_version::Column::Version.eq(version))
            .one(self.conn)
            .await?)
    }

    pub async fn exists(&self, provider_id: i32, version: &str) -> Result<bool, RepositoryError> {
        Ok(self.find_by_version(provider_id, version).await?.is_some())
    }

    /// All versions of a provider, newest semantic version first.
    pub async fn list_for_provider(
        &self,
        provider_id: i32,
    ) -> Result<Vec<provider_version::Model>, RepositoryError> {
        let mut versions = ProviderVersion::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .order_by_asc(provider_version::Column::Id)
            .all(self.conn)
            .await?;

        versions.sort_by(|a, b| {
            match (VersionNumber::parse(&a.version), VersionNumber::parse(&b.version)) {
                (Ok(a), Ok(b)) => b.cmp(&a),
                _ => b.version.cmp(&a.version),
            }
        });
        Ok(versions)
    }

    /// Inserts a version. A row for the same (provider, version) already
    /// present, including one written concurrently, yields `AlreadyExists`.
    ///
    /// # Arguments
    ///
    /// * `new` - The version row as produced by the extractor
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created version model
    pub async fn create(
        &self,
        new: NewProviderVersion,
    ) -> Result<provider_version::Model, RepositoryError> {
        let key = format!("{}@{}", new.provider_id, new.version);
        provider_version::ActiveModel {
            provider_id: Set(new.provider_id),
            version: Set(new.version.as_str().to_string()),
            beta: Set(new.version.is_prerelease()),
            git_tag: Set(new.git_tag),
            commit_hash: Set(new.commit_hash),
            published_at: Set(new.published_at.into()),
            gpg_key_id: Set(new.gpg_key_id),
            protocol_versions: Set(json!(new.protocol_versions)),
            extraction_version: Set(new.extraction_version),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, VERSION_ENTITY, key))
    }

    pub async fn update_attributes(
        &self,
        id: i32,
        attributes: VersionAttributes,
    ) -> Result<provider_version::Model, RepositoryError> {
        let existing = self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        if attributes == VersionAttributes::default() {
            return Ok(existing);
        }

        let mut active: provider_version::ActiveModel = existing.into();
        if let Some(published_at) = attributes.published_at {
            active.published_at = Set(published_at.into());
        }
        if let Some(protocols) = attributes.protocol_versions {
            active.protocol_versions = Set(json!(protocols));
        }
        Ok(active.update(self.conn).await?)
    }

    /// Deletes a version and its binaries and documentation, then re-points
    /// the provider at whatever is now the latest version.
    pub async fn delete(&self, id: i32) -> Result<provider_version::Model, RepositoryError> {
        let existing = self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        ProviderVersion::delete_by_id(id).exec(self.conn).await?;
        debug!(version_id = id, version = %existing.version, "deleted provider version");

        self.recompute_latest_version(existing.provider_id).await?;
        Ok(existing)
    }

    /// Highest non-beta semantic version of a provider, if any.
    pub async fn latest_version(
        &self,
        provider_id: i32,
    ) -> Result<Option<provider_version::Model>, RepositoryError> {
        let candidates = ProviderVersion::find()
            .filter(provider_version::Column::ProviderId.eq(provider_id))
            .filter(provider_version::Column::Beta.eq(false))
            .order_by_asc(provider_version::Column::Id)
            .all(self.conn)
            .await?;

        let latest = candidates
            .into_iter()
            .filter_map(|model| match VersionNumber::parse(&model.version) {
                Ok(version) => Some((version, model)),
                Err(err) => {
                    warn!(version_id = model.id, error = %err, "skipping unparsable stored version");
                    None
                }
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, model)| model);

        Ok(latest)
    }

    /// Re-derives the provider's latest-version pointer from the stored rows.
    pub async fn recompute_latest_version(
        &self,
        provider_id: i32,
    ) -> Result<Option<provider_version::Model>, RepositoryError> {
        let latest = self.latest_version(provider_id).await?;
        ProviderRepository::new(self.conn)
            .set_latest_version(provider_id, latest.as_ref().map(|model| model.id))
            .await?;
        Ok(latest)
    }
}

fn not_found(id: i32) -> RepositoryError {
    RepositoryError::NotFound {
        entity: VERSION_ENTITY,
        key: id.to_string(),
    }
}
