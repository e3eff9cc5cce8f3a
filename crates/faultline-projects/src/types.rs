use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use faultline_core::error::{error_response, internal_error_response, kind};
use faultline_database::StoreError;
use faultline_entities::projects;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("project not found")]
    ProjectNotFound,

    #[error("{0}")]
    MissingFields(String),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        match self {
            RegistryError::ProjectNotFound => error_response(
                StatusCode::NOT_FOUND,
                kind::PROJECT_NOT_FOUND,
                "project not found",
            ),
            RegistryError::MissingFields(message) => {
                error_response(StatusCode::BAD_REQUEST, kind::MISSING_FIELDS, &message)
            }
            RegistryError::Database(err) => {
                tracing::error!(error = %err, "registry database error");
                internal_error_response()
            }
            RegistryError::Store(err) => {
                tracing::error!(error = %err, "registry storage error");
                internal_error_response()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub platform: Option<String>,
}

/// The registry capabilities the ingestion and query surfaces depend on.
///
/// A caller without access to a project gets `ProjectNotFound`, never a 403,
/// so project existence cannot be enumerated. After `delete_project` returns
/// the project's shard has been destroyed and no late writes can reach it.
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    async fn get_project_by_key(
        &self,
        public_key: &str,
    ) -> Result<Option<projects::Model>, RegistryError>;

    async fn get_project_by_slug(
        &self,
        slug: &str,
        user_id: &str,
    ) -> Result<projects::Model, RegistryError>;

    async fn create_project(
        &self,
        request: CreateProjectRequest,
        user_id: &str,
    ) -> Result<projects::Model, RegistryError>;

    async fn delete_project(&self, project_id: &str, user_id: &str) -> Result<(), RegistryError>;
}
