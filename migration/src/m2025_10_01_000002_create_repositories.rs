//! Migration to create the repositories table.
//!
//! Rows are an immutable snapshot of the upstream repository that backs a
//! provider, tagged with the name of the configured source that hosts it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::ProviderSource).text().not_null())
                    .col(ColumnDef::new(Repositories::ProviderId).text().not_null())
                    .col(ColumnDef::new(Repositories::Owner).text().not_null())
                    .col(ColumnDef::new(Repositories::Name).text().not_null())
                    .col(ColumnDef::new(Repositories::Description).text().null())
                    .col(ColumnDef::new(Repositories::CloneUrl).text().not_null())
                    .col(ColumnDef::new(Repositories::LogoUrl).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_source_upstream_id")
                    .table(Repositories::Table)
                    .col(Repositories::ProviderSource)
                    .col(Repositories::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    ProviderSource,
    ProviderId,
    Owner,
    Name,
    Description,
    CloneUrl,
    LogoUrl,
}
