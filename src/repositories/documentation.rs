//! Provider version documentation repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{RepositoryError, insert_error};
use crate::models::provider_version_documentation::{
    self, DocumentationType, Entity as ProviderVersionDocumentation,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocumentation {
    pub provider_version_id: i32,
    pub documentation_type: DocumentationType,
    pub title: String,
    pub slug: String,
    pub filename: String,
    pub language: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub content: String,
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentationFilter {
    pub provider_version_id: i32,
    pub documentation_type: Option<DocumentationType>,
    pub slug: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderVersionDocumentationRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProviderVersionDocumentationRepository<'a, C> {
    /// Creates a new ProviderVersionDocumentationRepository bound to a connection
    ///
    /// # Arguments
    ///
    /// * `conn` - Database pool, transaction or savepoint to run queries on
    ///
    /// # Returns
    ///
    /// Returns a new ProviderVersionDocumentationRepository instance
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Stores one documentation page
    ///
    /// # Arguments
    ///
    /// * `new` - The page, unique per version, type, slug and language
    ///
    /// # Returns
    ///
    /// Returns a Result containing the stored page, or `AlreadyExists` on a
    /// duplicate
    pub async fn create(
        &self,
        new: NewDocumentation,
    ) -> Result<provider_version_documentation::Model, RepositoryError> {
        let key = format!(
            "{}/{}/{}/{}",
            new.provider_version_id, new.documentation_type, new.language, new.slug
        );
        provider_version_documentation::ActiveModel {
            provider_version_id: Set(new.provider_version_id),
            documentation_type: Set(new.documentation_type),
            title: Set(new.title),
            slug: Set(new.slug),
            filename: Set(new.filename),
            language: Set(new.language),
            subcategory: Set(new.subcategory),
            description: Set(new.description),
            content: Set(new.content),
            ..Default::default()
        }
        .insert(self.conn)
        .await
        .map_err(|err| insert_error(err, "documentation page", key))
    }

    pub async fn find_by_id(
        &self,
        id: i32,
    ) -> Result<Option<provider_version_documentation::Model>, RepositoryError> {
        Ok(ProviderVersionDocumentation::find_by_id(id)
            .one(self.conn)
            .await?)
    }

    pub async fn list(
        &self,
        filter: &DocumentationFilter,
    ) -> Result<Vec<provider_version_documentation::Model>, RepositoryError> {
        let mut query = ProviderVersionDocumentation::find().filter(
            provider_version_documentation::Column::ProviderVersionId.eq(filter.provider_version_id),
        );
        if let Some(documentation_type) = filter.documentation_type {
            query = query
                .filter(provider_version_documentation::Column::DocumentationType.eq(documentation_type));
        }
        if let Some(slug) = &filter.slug {
            query = query.filter(provider_version_documentation::Column::Slug.eq(slug.as_str()));
        }
        if let Some(language) = &filter.language {
            query = query.filter(provider_version_documentation::Column::Language.eq(language.as_str()));
        }

        Ok(query
            .order_by_asc(provider_version_documentation::Column::Id)
            .all(self.conn)
            .await?)
    }
}
