//! Provider entity model
//!
//! A provider is a named plugin inside a namespace, backed by exactly one
//! upstream repository.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub namespace_id: i32,

    /// Provider name, unique inside its namespace
    pub name: String,

    pub tier: ProviderTier,

    pub description: Option<String>,

    pub category_id: Option<i32>,

    pub repository_id: i32,

    /// Use the statically configured credential instead of an app installation
    pub use_default_credential: bool,

    /// Highest non-beta imported version, set only once one exists
    pub latest_version_id: Option<i32>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ProviderTier {
    #[sea_orm(string_value = "official")]
    #[serde(rename = "official")]
    Official,

    #[sea_orm(string_value = "community")]
    #[serde(rename = "community")]
    #[default]
    Community,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::namespace::Entity",
        from = "Column::NamespaceId",
        to = "super::namespace::Column::Id"
    )]
    Namespace,

    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id"
    )]
    Repository,

    #[sea_orm(has_many = "super::provider_version::Entity")]
    ProviderVersion,
}

impl Related<super::namespace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Namespace.def()
    }
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl Related<super::provider_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
