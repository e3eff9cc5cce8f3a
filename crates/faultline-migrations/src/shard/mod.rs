use sea_orm_migration::prelude::*;

mod m20250601_000001_create_shard_tables;

pub struct ShardMigrator;

#[async_trait::async_trait]
impl MigratorTrait for ShardMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250601_000001_create_shard_tables::Migration)]
    }
}
