//! Provider version binary entity model
//!
//! One row per (version, OS, architecture) build of a provider.

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_version_binaries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub provider_version_id: i32,

    pub operating_system: OperatingSystem,

    pub architecture: Architecture,

    /// Release asset name, e.g. `terraform-provider-foo_1.0.0_linux_amd64.zip`
    pub filename: String,

    /// Lowercase hex SHA-256 of the asset
    pub checksum: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    #[sea_orm(string_value = "freebsd")]
    Freebsd,
    #[sea_orm(string_value = "darwin")]
    Darwin,
    #[sea_orm(string_value = "windows")]
    Windows,
    #[sea_orm(string_value = "linux")]
    Linux,
}

impl OperatingSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingSystem::Freebsd => "freebsd",
            OperatingSystem::Darwin => "darwin",
            OperatingSystem::Windows => "windows",
            OperatingSystem::Linux => "linux",
        }
    }
}

impl FromStr for OperatingSystem {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "freebsd" => Ok(OperatingSystem::Freebsd),
            "darwin" => Ok(OperatingSystem::Darwin),
            "windows" => Ok(OperatingSystem::Windows),
            "linux" => Ok(OperatingSystem::Linux),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Architecture {
    #[sea_orm(string_value = "amd64")]
    #[serde(rename = "amd64")]
    Amd64,
    #[sea_orm(string_value = "arm")]
    #[serde(rename = "arm")]
    Arm,
    #[sea_orm(string_value = "arm64")]
    #[serde(rename = "arm64")]
    Arm64,
    #[sea_orm(string_value = "386")]
    #[serde(rename = "386")]
    I386,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
            Architecture::I386 => "386",
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "amd64" => Ok(Architecture::Amd64),
            "arm" => Ok(Architecture::Arm),
            "arm64" => Ok(Architecture::Arm64),
            "386" => Ok(Architecture::I386),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Architecture {
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
