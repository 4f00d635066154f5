//! GPG key repository
//!
//! Keys are read in ascending id order so signature verification tries
//! candidates deterministically.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{RepositoryError, insert_error};
use crate::models::gpg_key::{self, Entity as GpgKey};

#[derive(Debug, Clone, Copy)]
pub struct GpgKeyRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> GpgKeyRepository<'a, C> {
    /// Creates a new GpgKeyRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new GpgKeyRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<gpg_key::Model>, RepositoryError> {
        Ok(GpgKey::find_by_id(id).one(self.conn).await?)
    }

    pub async fn list_for_namespace(
        &self,
        namespace_id: i32,
    ) -> Result<Vec<gpg_key::Model>, RepositoryError> {
        Ok(GpgKey::find()
            .filter(gpg_key::Column::NamespaceId.eq(namespace_id))
            .order_by_asc(gpg_key::Column::Id)
            .all(self.conn)
            .await?)
    }

    /// Stores a key. The fingerprint is uppercased so lookups and key ids are
    /// stable regardless of how it was supplied.
    ///
    /// # Arguments
    ///
    /// * `namespace_id` - Namespace that trusts the key
    /// * `ascii_armor` - The armored public key block
    /// * `fingerprint` - Hex fingerprint of the primary key
    ///
    /// # Returns
    ///
    /// Returns a Result containing the stored key model
    pub async fn create(
        &self,
        namespace_id: i32,
        ascii_armor: &str,
        fingerprint: &str,
    ) -> Result<gpg_key::Model, RepositoryError> {
        let fingerprint = fingerprint.to_ascii_uppercase();
        gpg_key::ActiveModel {
            namespace_id: Set(namespace_id),
            ascii_armor: Set(ascii_armor.to_string()),
            fingerprint: Set(fingerprint.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "gpg key", fingerprint))
    }
}
