//! Provider repository for database operations
//!
//! Providers are looked up either by id or by their public address
//! (`namespace/name`). The only field ingestion writes after creation is the
//! latest-version pointer.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{RepositoryError, insert_error};
use crate::models::namespace::{self, Entity as Namespace};
use crate::models::provider::{self, Entity as Provider, ProviderTier};

/// Fields of a provider row before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    pub namespace_id: i32,
    pub name: String,
    pub tier: ProviderTier,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub repository_id: i32,
    pub use_default_credential: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProviderRepository<'a, C> {
    /// Creates a new ProviderRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new ProviderRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<provider::Model>, RepositoryError> {
        Ok(Provider::find_by_id(id).one(self.conn).await?)
    }

    /// Finds a provider by `namespace/name`, returning its namespace alongside.
    pub async fn find_by_address(
        &self,
        namespace_name: &str,
        provider_name: &str,
    ) -> Result<Option<(namespace::Model, provider::Model)>, RepositoryError> {
        let Some(namespace) = Namespace::find()
            .filter(namespace::Column::Name.eq(namespace_name))
            .one(self.conn)
            .await?
        else {
            return Ok(None);
        };

        let provider = Provider::find()
            .filter(provider::Column::NamespaceId.eq(namespace.id))
            .filter(provider::Column::Name.eq(provider_name))
            .one(self.conn)
            .await?;

        Ok(provider.map(|provider| (namespace, provider)))
    }

    pub async fn list_for_namespace(
        &self,
        namespace_id: i32,
    ) -> Result<Vec<provider::Model>, RepositoryError> {
        Ok(Provider::find()
            .filter(provider::Column::NamespaceId.eq(namespace_id))
            .order_by_asc(provider::Column::Name)
            .all(self.conn)
            .await?)
    }

    /// Creates a provider
    ///
    /// # Arguments
    ///
    /// * `new` - Namespace, name, tier and backing repository of the provider
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created provider model
    pub async fn create(&self, new: NewProvider) -> Result<provider::Model, RepositoryError> {
        let key = format!("{}/{}", new.namespace_id, new.name);
        provider::ActiveModel {
            namespace_id: Set(new.namespace_id),
            name: Set(new.name),
            tier: Set(new.tier),
            description: Set(new.description),
            category_id: Set(new.category_id),
            repository_id: Set(new.repository_id),
            use_default_credential: Set(new.use_default_credential),
            latest_version_id: Set(None),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "provider", key))
    }

    /// Points the provider at a new latest version, or clears the pointer.
    pub async fn set_latest_version(
        &self,
        provider_id: i32,
        version_id: Option<i32>,
    ) -> Result<provider::Model, RepositoryError> {
        let existing = self
            .find_by_id(provider_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "provider",
                key: provider_id.to_string(),
            })?;

        if existing.latest_version_id == version_id {
            return Ok(existing);
        }

        let mut active: provider::ActiveModel = existing.into();
        active.latest_version_id = Set(version_id);
        Ok(active.update(self.conn).await?)
    }
}
