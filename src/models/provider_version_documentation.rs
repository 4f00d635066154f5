//! Provider version documentation entity model

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_version_documentation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_version_id: i32,

    pub documentation_type: DocumentationType,

    pub title: String,

    /// File name with its markdown extension stripped
    pub slug: String,

    pub filename: String,

    pub language: String,

    pub subcategory: Option<String>,

    pub description: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,
}

/// Documentation page category, rendered verbatim as the protocol `category`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum DocumentationType {
    #[sea_orm(string_value = "overview")]
    #[serde(rename = "overview")]
    Overview,
    #[sea_orm(string_value = "provider")]
    #[serde(rename = "provider")]
    Provider,
    #[sea_orm(string_value = "resource")]
    #[serde(rename = "resource")]
    Resource,
    #[sea_orm(string_value = "data-source")]
    #[serde(rename = "data-source")]
    DataSource,
    #[sea_orm(string_value = "guide")]
    #[serde(rename = "guide")]
    Guide,
}

impl DocumentationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentationType::Overview => "overview",
            DocumentationType::Provider => "provider",
            DocumentationType::Resource => "resource",
            DocumentationType::DataSource => "data-source",
            DocumentationType::Guide => "guide",
        }
    }

    /// Directory the page lives in under `docs/`, used for the protocol `path`.
    pub fn directory(&self) -> Option<&'static str> {
        match self {
            DocumentationType::Overview | DocumentationType::Provider => None,
            DocumentationType::Resource => Some("resources"),
            DocumentationType::DataSource => Some("data-sources"),
            DocumentationType::Guide => Some("guides"),
        }
    }
}

impl FromStr for DocumentationType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "overview" => Ok(DocumentationType::Overview),
            "provider" => Ok(DocumentationType::Provider),
            "resource" | "resources" => Ok(DocumentationType::Resource),
            "data-source" | "data-sources" => Ok(DocumentationType::DataSource),
            "guide" | "guides" => Ok(DocumentationType::Guide),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for DocumentationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::provider_version::Entity",
        from = "Column::ProviderVersionId",
        to = "super::provider_version::Column::Id",
        on_delete = "Cascade"
    )]
    ProviderVersion,
}

impl Related<super::provider_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
