//! Test utilities for storage-backed tests
//!
//! Provides temp-dir backed registry and shard stores so tests across the
//! workspace get isolated databases without any external service.

use std::sync::Arc;

use tempfile::TempDir;

use crate::{establish_registry, DbConnection, ShardManager, StoreError};

/// An isolated pair of stores rooted in a temp directory. Dropping the
/// value removes everything.
pub struct TestStore {
    _dir: TempDir,
    pub registry: Arc<DbConnection>,
    pub shards: Arc<ShardManager>,
}

impl TestStore {
    pub async fn new() -> Result<Self, StoreError> {
        let dir = TempDir::new()?;
        let registry = establish_registry(dir.path()).await?;
        let shards = Arc::new(ShardManager::new(dir.path(), 16));

        Ok(Self {
            _dir: dir,
            registry,
            shards,
        })
    }
}
