//! Database migrations for both Faultline stores.
//!
//! `RegistryMigrator` manages the single registry store. `ShardMigrator`
//! manages a per-project shard store; it runs every time a shard is opened,
//! which is what makes lazy schema creation and reopening evicted shards
//! safe.

pub use sea_orm_migration::prelude::*;

mod registry;
mod shard;

pub use registry::RegistryMigrator;
pub use shard::ShardMigrator;
