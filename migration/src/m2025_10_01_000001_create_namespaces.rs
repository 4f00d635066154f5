//! Migration to create the namespaces and gpg_keys tables.
//!
//! A namespace owns the providers published under it and the public keys
//! that are allowed to sign their releases.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Namespaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Namespaces::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Namespaces::Name).text().not_null())
                    .col(
                        ColumnDef::new(Namespaces::NamespaceType)
                            .text()
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(Namespaces::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_namespaces_name")
                    .table(Namespaces::Table)
                    .col(Namespaces::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GpgKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GpgKeys::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GpgKeys::NamespaceId).integer().not_null())
                    .col(ColumnDef::new(GpgKeys::AsciiArmor).text().not_null())
                    .col(ColumnDef::new(GpgKeys::Fingerprint).text().not_null())
                    .col(
                        ColumnDef::new(GpgKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gpg_keys_namespace_id")
                            .from(GpgKeys::Table, GpgKeys::NamespaceId)
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One fingerprint per namespace
        manager
            .create_index(
                Index::create()
                    .name("idx_gpg_keys_namespace_fingerprint")
                    .table(GpgKeys::Table)
                    .col(GpgKeys::NamespaceId)
                    .col(GpgKeys::Fingerprint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GpgKeys::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Namespaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
    Name,
    NamespaceType,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GpgKeys {
    Table,
    Id,
    NamespaceId,
    AsciiArmor,
    Fingerprint,
    CreatedAt,
}
