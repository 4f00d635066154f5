//! Provider version binary repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{RepositoryError, insert_error};
use crate::models::provider_version_binary::{
    self, Architecture, Entity as ProviderVersionBinary, OperatingSystem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBinary {
    pub provider_version_id: i32,
    pub operating_system: OperatingSystem,
    pub architecture: Architecture,
    pub filename: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderVersionBinaryRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProviderVersionBinaryRepository<'a, C> {
    /// Creates a new ProviderVersionBinaryRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new ProviderVersionBinaryRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Inserts a binary; a second build for the same platform is `AlreadyExists`.
    ///
    /// # Arguments
    ///
    /// * `new` - The binary's version, platform, filename and checksum
    ///
    /// # Returns
    ///
    /// Returns a Result containing the stored binary model
    pub async fn create(
        &self,
        new: NewBinary,
    ) -> Result<provider_version_binary::Model, RepositoryError> {
        let key = format!(
            "{}/{}_{}",
            new.provider_version_id, new.operating_system, new.architecture
        );
        provider_version_binary::ActiveModel {
            provider_version_id: Set(new.provider_version_id),
            operating_system: Set(new.operating_system),
            architecture: Set(new.architecture),
            filename: Set(new.filename),
            checksum: Set(new.checksum),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "provider version binary", key))
    }

    pub async fn list_for_version(
        &self,
        provider_version_id: i32,
    ) -> Result<Vec<provider_version_binary::Model>, RepositoryError> {
        self.list_for_versions(&[provider_version_id]).await
    }

    pub async fn list_for_versions(
        &self,
        provider_version_ids: &[i32],
    ) -> Result<Vec<provider_version_binary::Model>, RepositoryError> {
        if provider_version_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(ProviderVersionBinary::find()
            .filter(
                provider_version_binary::Column::ProviderVersionId
                    .is_in(provider_version_ids.iter().copied()),
            )
            .order_by_asc(provider_version_binary::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn find_for_platform(
        &self,
        provider_version_id: i32,
        operating_system: OperatingSystem,
        architecture: Architecture,
    ) -> Result<Option<provider_version_binary::Model>, RepositoryError> {
        Ok(ProviderVersionBinary::find()
            .filter(provider_version_binary::Column::ProviderVersionId.eq(provider_version_id))
            .filter(provider_version_binary::Column::OperatingSystem.eq(operating_system))
            .filter(provider_version_binary::Column::Architecture.eq(architecture))
            .one(self.conn)
            .await?)
    }
}
