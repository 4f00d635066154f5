//! Namespace entity model
//!
//! Namespaces are created by the account-management side of the registry;
//! ingestion only reads them to scope keys and resolve app installations.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "namespaces")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique namespace name as it appears in provider addresses
    pub name: String,

    /// Which kind of upstream account owns the namespace
    pub namespace_type: NamespaceType,

    pub created_at: DateTimeWithTimeZone,
}

/// Kind of upstream account a namespace maps to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum NamespaceType {
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    #[default]
    None,

    #[sea_orm(string_value = "github_user")]
    #[serde(rename = "github_user")]
    GithubUser,

    #[sea_orm(string_value = "github_organisation")]
    #[serde(rename = "github_organisation")]
    GithubOrganisation,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::gpg_key::Entity")]
    GpgKey,

    #[sea_orm(has_many = "super::provider::Entity")]
    Provider,
}

impl Related<super::gpg_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GpgKey.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
