//! Migration to create the providers table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Providers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Providers::NamespaceId).integer().not_null())
                    .col(ColumnDef::new(Providers::Name).text().not_null())
                    .col(
                        ColumnDef::new(Providers::Tier)
                            .text()
                            .not_null()
                            .default("community"),
                    )
                    .col(ColumnDef::new(Providers::Description).text().null())
                    .col(ColumnDef::new(Providers::CategoryId).integer().null())
                    .col(ColumnDef::new(Providers::RepositoryId).integer().not_null())
                    .col(
                        ColumnDef::new(Providers::UseDefaultCredential)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // No foreign key: provider_versions references this table.
                    .col(ColumnDef::new(Providers::LatestVersionId).integer().null())
                    .col(
                        ColumnDef::new(Providers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_namespace_id")
                            .from(Providers::Table, Providers::NamespaceId)
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_repository_id")
                            .from(Providers::Table, Providers::RepositoryId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_providers_namespace_name")
                    .table(Providers::Table)
                    .col(Providers::NamespaceId)
                    .col(Providers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // A repository backs at most one provider
        manager
            .create_index(
                Index::create()
                    .name("idx_providers_repository_id")
                    .table(Providers::Table)
                    .col(Providers::RepositoryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Providers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
    NamespaceId,
    Name,
    Tier,
    Description,
    CategoryId,
    RepositoryId,
    UseDefaultCredential,
    LatestVersionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
}
