//! Namespace repository

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::{RepositoryError, insert_error};
use crate::models::namespace::{self, Entity as Namespace, NamespaceType};

#[derive(Debug, Clone, Copy)]
pub struct NamespaceRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> NamespaceRepository<'a, C> {
    /// Creates a new NamespaceRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new NamespaceRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<namespace::Model>, RepositoryError> {
        Ok(Namespace::find_by_id(id).one(self.conn).await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<namespace::Model>, RepositoryError> {
        Ok(Namespace::find()
            .filter(namespace::Column::Name.eq(name))
            .one(self.conn)
            .await?)
    }

    /// Creates a namespace
    ///
    /// # Arguments
    ///
    /// * `name` - Unique namespace name
    /// * `namespace_type` - Kind of account that owns the namespace
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created namespace model
    pub async fn create(
        &self,
        name: &str,
        namespace_type: NamespaceType,
    ) -> Result<namespace::Model, RepositoryError> {
        namespace::ActiveModel {
            name: Set(name.to_string()),
            namespace_type: Set(namespace_type),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "namespace", name))
    }
}
