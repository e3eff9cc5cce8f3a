//! Registry store connection management

use std::path::Path;
use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use faultline_migrations::RegistryMigrator;

use crate::StoreError;

pub type DbConnection = DatabaseConnection;

pub(crate) fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

/// Open (creating if needed) the registry store and bring its schema up to
/// date.
pub async fn establish_registry(data_dir: &Path) -> Result<Arc<DbConnection>, StoreError> {
    std::fs::create_dir_all(data_dir)?;

    let mut opt = ConnectOptions::new(sqlite_url(&data_dir.join("registry.db")));
    opt.max_connections(8).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    RegistryMigrator::up(&db, None).await?;

    Ok(Arc::new(db))
}
