//! Provider version entity model
//!
//! One row per imported release. Rows are immutable after creation apart
//! from the publish timestamp and the protocol list.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_id: i32,

    /// Semantic version without the leading `v`
    pub version: String,

    /// True iff the version carries a prerelease suffix
    pub beta: bool,

    pub git_tag: String,

    pub commit_hash: String,

    pub published_at: DateTimeWithTimeZone,

    /// Key that verified the release's checksum manifest
    pub gpg_key_id: i32,

    /// Supported plugin protocol versions, stored as a JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub protocol_versions: JsonValue,

    /// Schema stamp of the extraction that produced this row
    pub extraction_version: i32,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Protocol versions as plain strings, skipping anything malformed.
    pub fn protocols(&self) -> Vec<String> {
        self.protocol_versions
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id"
    )]
    Provider,

    #[sea_orm(
        belongs_to = "super::gpg_key::Entity",
        from = "Column::GpgKeyId",
        to = "super::gpg_key::Column::Id"
    )]
    GpgKey,

    #[sea_orm(has_many = "super::provider_version_binary::Entity")]
    Binary,

    #[sea_orm(has_many = "super::provider_version_documentation::Entity")]
    Documentation,
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl Related<super::gpg_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GpgKey.def()
    }
}

impl Related<super::provider_version_binary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Binary.def()
    }
}

impl Related<super::provider_version_documentation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documentation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
