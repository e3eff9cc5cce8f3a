//! Storage plumbing for both Faultline stores.
//!
//! The registry store is a single SQLite database. Every project additionally
//! owns a shard store (one SQLite file) reached through the [`ShardManager`],
//! which bounds the number of open handles and serializes writes per shard.

pub use sea_orm;

mod connection;
mod error;
mod manager;
mod shard;

pub use connection::{establish_registry, DbConnection};
pub use error::StoreError;
pub use manager::ShardManager;
pub use shard::ProjectShard;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
