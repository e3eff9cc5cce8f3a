use sea_orm::DbErr;
use thiserror::Error;

/// Failures opening, migrating or destroying a store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}
