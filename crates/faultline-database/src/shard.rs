//! One project's storage handle.

use std::path::{Path, PathBuf};

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::Mutex;

use faultline_migrations::ShardMigrator;

use crate::connection::sqlite_url;
use crate::StoreError;

/// A per-project SQLite store.
///
/// The shard behaves as a single logical writer: every write transaction
/// must run under [`ProjectShard::write_lock`], which makes the ingest and
/// update step sequences atomic with respect to each other on the same
/// shard. Reads go straight to the connection.
pub struct ProjectShard {
    project_id: String,
    db: DatabaseConnection,
    write_lock: Mutex<()>,
}

impl ProjectShard {
    /// Open the shard for `project_id`, creating the database file and its
    /// schema on first use. The migration is idempotent, so reopening a
    /// shard after pool eviction is safe.
    pub async fn open(data_dir: &Path, project_id: &str) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;

        let mut opt = ConnectOptions::new(sqlite_url(&Self::db_path(data_dir, project_id)));
        opt.max_connections(8).sqlx_logging(false);

        let db = Database::connect(opt).await?;
        ShardMigrator::up(&db, None).await?;

        tracing::debug!(project_id, "opened project shard");

        Ok(Self {
            project_id: project_id.to_string(),
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn db_path(data_dir: &Path, project_id: &str) -> PathBuf {
        data_dir.join(format!("project-{project_id}.db"))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Serialization primitive for write transactions. Hold the guard for
    /// the whole transaction, not per statement.
    pub fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }
}
