//! Database migrations for the provider registry.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_10_01_000001_create_namespaces;
mod m2025_10_01_000002_create_repositories;
mod m2025_10_01_000003_create_providers;
mod m2025_10_01_000004_create_provider_versions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_10_01_000001_create_namespaces::Migration),
            Box::new(m2025_10_01_000002_create_repositories::Migration),
            Box::new(m2025_10_01_000003_create_providers::Migration),
            Box::new(m2025_10_01_000004_create_provider_versions::Migration),
        ]
    }
}
