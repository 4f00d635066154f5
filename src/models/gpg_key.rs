//! GPG key entity model
//!
//! Public keys registered for a namespace. Ingestion never writes to this
//! table; it only reads the candidates when verifying a release signature.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "gpg_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace_id: i32,

    /// ASCII-armored OpenPGP public key block
    pub ascii_armor: String,

    /// Uppercase hex v4 fingerprint of the primary key
    pub fingerprint: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Long key id: the low 64 bits of the fingerprint, as clients expect it.
    pub fn key_id(&self) -> &str {
        let len = self.fingerprint.len();
        &self.fingerprint[len.saturating_sub(16)..]
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::namespace::Entity",
        from = "Column::NamespaceId",
        to = "super::namespace::Column::Id"
    )]
    Namespace,
}

impl Related<super::namespace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Namespace.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
