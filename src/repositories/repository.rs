//! Upstream repository records

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::{RepositoryError, insert_error};
use crate::models::repository::{self, Entity as Repository};

/// Fields of a repository row before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    pub provider_source: String,
    pub provider_id: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub clone_url: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RepositoryRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> RepositoryRepository<'a, C> {
    /// Creates a new RepositoryRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new RepositoryRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<repository::Model>, RepositoryError> {
        Ok(Repository::find_by_id(id).one(self.conn).await?)
    }

    /// Looks a repository up by the host's own identifier.
    pub async fn find_by_provider_id(
        &self,
        provider_source: &str,
        provider_id: &str,
    ) -> Result<Option<repository::Model>, RepositoryError> {
        Ok(Repository::find()
            .filter(repository::Column::ProviderSource.eq(provider_source))
            .filter(repository::Column::ProviderId.eq(provider_id))
            .one(self.conn)
            .await?)
    }

    /// Records a source repository
    ///
    /// # Arguments
    ///
    /// * `new` - Source name, upstream id, owner and name of the repository
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created repository model
    pub async fn create(&self, new: NewRepository) -> Result<repository::Model, RepositoryError> {
        let key = format!("{}/{}", new.provider_source, new.provider_id);
        repository::ActiveModel {
            provider_source: Set(new.provider_source),
            provider_id: Set(new.provider_id),
            owner: Set(new.owner),
            name: Set(new.name),
            description: Set(new.description),
            clone_url: Set(new.clone_url),
            logo_url: Set(new.logo_url),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "repository", key))
    }
}
