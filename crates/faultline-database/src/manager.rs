//! The bounded pool of open shard handles.

use std::path::PathBuf;
use std::sync::Arc;

use moka::future::Cache;

use crate::{ProjectShard, StoreError};

/// Opens shards on demand and keeps up to `capacity` handles alive.
///
/// Eviction drops the pool's `Arc`; the underlying connection closes once
/// in-flight requests release theirs. A later lookup simply reopens the
/// shard (schema creation is idempotent). Shards of different projects are
/// fully independent.
pub struct ShardManager {
    data_dir: PathBuf,
    pool: Cache<String, Arc<ProjectShard>>,
}

impl ShardManager {
    pub fn new(data_dir: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            pool: Cache::new(capacity),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Get the shard for `project_id`, opening it if it is not pooled.
    pub async fn shard(&self, project_id: &str) -> Result<Arc<ProjectShard>, StoreError> {
        let data_dir = self.data_dir.clone();
        let id = project_id.to_string();

        self.pool
            .try_get_with(id.clone(), async move {
                ProjectShard::open(&data_dir, &id).await.map(Arc::new)
            })
            .await
            .map_err(|err: Arc<StoreError>| match Arc::try_unwrap(err) {
                Ok(err) => err,
                Err(shared) => StoreError::Io(std::io::Error::other(shared.to_string())),
            })
    }

    /// Destroy a project's shard: drop the pooled handle and remove the
    /// database files. Call only after the registry has confirmed deletion,
    /// so no late writes can arrive.
    pub async fn destroy(&self, project_id: &str) -> Result<(), StoreError> {
        self.pool.invalidate(project_id).await;

        let db_path = ProjectShard::db_path(&self.data_dir, project_id);
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{suffix}", db_path.display()));
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(project_id, "destroyed project shard");
        Ok(())
    }
}
