//! Repository entity model
//!
//! Immutable snapshot of the upstream repository that backs a provider.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Name of the configured provider source hosting this repository
    pub provider_source: String,

    /// Identifier of the repository on the upstream host
    pub provider_id: String,

    pub owner: String,

    pub name: String,

    pub description: Option<String>,

    pub clone_url: String,

    pub logo_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::provider::Entity")]
    Provider,
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
