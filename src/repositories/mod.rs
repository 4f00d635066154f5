//! # Repository Layer
//!
//! Repository structs wrapping SeaORM operations for the registry tables.
//! Every repository borrows a connection generic over
//! [`sea_orm::ConnectionTrait`], so the same code runs against the pool, the
//! outer refresh transaction or a per-release savepoint.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

pub mod binary;
pub mod documentation;
pub mod gpg_key;
pub mod namespace;
pub mod provider;
pub mod provider_version;
pub mod repository;

pub use binary::{NewBinary, ProviderVersionBinaryRepository};
pub use documentation::{DocumentationFilter, NewDocumentation, ProviderVersionDocumentationRepository};
pub use gpg_key::GpgKeyRepository;
pub use namespace::NamespaceRepository;
pub use provider::{NewProvider, ProviderRepository};
pub use provider_version::{
    NewProviderVersion, ProviderVersionRepository, VERSION_ENTITY, VersionAttributes,
};
pub use repository::{NewRepository, RepositoryRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint rejected the row. Concurrent refreshes of the same
    /// provider surface here.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl RepositoryError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RepositoryError::AlreadyExists { .. })
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Maps an insert failure, turning unique violations into `AlreadyExists`.
pub(crate) fn insert_error(err: DbErr, entity: &'static str, key: impl Into<String>) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::AlreadyExists {
            entity,
            key: key.into(),
        }
    } else {
        RepositoryError::Database(err)
    }
}

