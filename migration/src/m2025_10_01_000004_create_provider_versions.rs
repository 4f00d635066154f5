//! Migration to create the provider version tables.
//!
//! Creates provider_versions together with the per-platform binaries and the
//! documentation pages extracted for each version. Both child tables cascade
//! on delete of their parent version.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersions::ProviderId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderVersions::Version).text().not_null())
                    .col(
                        ColumnDef::new(ProviderVersions::Beta)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ProviderVersions::GitTag).text().not_null())
                    .col(ColumnDef::new(ProviderVersions::CommitHash).text().not_null())
                    .col(
                        ColumnDef::new(ProviderVersions::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderVersions::GpgKeyId).integer().not_null())
                    .col(
                        ColumnDef::new(ProviderVersions::ProtocolVersions)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersions::ExtractionVersion)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderVersions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_versions_provider_id")
                            .from(ProviderVersions::Table, ProviderVersions::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_versions_gpg_key_id")
                            .from(ProviderVersions::Table, ProviderVersions::GpgKeyId)
                            .to(GpgKeys::Table, GpgKeys::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Versions are immutable once imported; re-import must fail here
        manager
            .create_index(
                Index::create()
                    .name("idx_provider_versions_provider_version")
                    .table(ProviderVersions::Table)
                    .col(ProviderVersions::ProviderId)
                    .col(ProviderVersions::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderVersionBinaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::ProviderVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::OperatingSystem)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::Architecture)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::Filename)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionBinaries::Checksum)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_version_binaries_version_id")
                            .from(
                                ProviderVersionBinaries::Table,
                                ProviderVersionBinaries::ProviderVersionId,
                            )
                            .to(ProviderVersions::Table, ProviderVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_version_binaries_platform")
                    .table(ProviderVersionBinaries::Table)
                    .col(ProviderVersionBinaries::ProviderVersionId)
                    .col(ProviderVersionBinaries::OperatingSystem)
                    .col(ProviderVersionBinaries::Architecture)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderVersionDocumentation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::ProviderVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::DocumentationType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Title)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Slug)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Filename)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Language)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Subcategory)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Description)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProviderVersionDocumentation::Content)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_version_documentation_version_id")
                            .from(
                                ProviderVersionDocumentation::Table,
                                ProviderVersionDocumentation::ProviderVersionId,
                            )
                            .to(ProviderVersions::Table, ProviderVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_version_documentation_page")
                    .table(ProviderVersionDocumentation::Table)
                    .col(ProviderVersionDocumentation::ProviderVersionId)
                    .col(ProviderVersionDocumentation::DocumentationType)
                    .col(ProviderVersionDocumentation::Language)
                    .col(ProviderVersionDocumentation::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ProviderVersionDocumentation::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ProviderVersionBinaries::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ProviderVersions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderVersions {
    Table,
    Id,
    ProviderId,
    Version,
    Beta,
    GitTag,
    CommitHash,
    PublishedAt,
    GpgKeyId,
    ProtocolVersions,
    ExtractionVersion,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProviderVersionBinaries {
    Table,
    Id,
    ProviderVersionId,
    OperatingSystem,
    Architecture,
    Filename,
    Checksum,
}

#[derive(DeriveIden)]
enum ProviderVersionDocumentation {
    Table,
    Id,
    ProviderVersionId,
    DocumentationType,
    Title,
    Slug,
    Filename,
    Language,
    Subcategory,
    Description,
    Content,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum GpgKeys {
    Table,
    Id,
}
