use sea_orm_migration::prelude::*;

mod m20250601_000001_create_registry_tables;

pub struct RegistryMigrator;

#[async_trait::async_trait]
impl MigratorTrait for RegistryMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250601_000001_create_registry_tables::Migration,
        )]
    }
}
