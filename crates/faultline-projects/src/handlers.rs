//! Project management endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use faultline_core::CurrentUser;
use faultline_entities::projects;

use crate::{CreateProjectRequest, ProjectRegistry, RegistryError, RegistryService};

#[derive(OpenApi)]
#[openapi(
    paths(create_project, list_projects, get_project, delete_project),
    components(schemas(CreateProjectRequest, ProjectResponse)),
    tags(
        (name = "projects", description = "Project management endpoints")
    )
)]
pub struct ProjectsApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RegistryService>,
    /// Public base URL used to render DSNs, e.g. `https://faultline.example.com`
    pub public_base_url: String,
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{slug}",
            get(get_project).delete(delete_project),
        )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub platform: Option<String>,
    pub public_key: String,
    /// SDK-facing DSN: `{scheme}://{public_key}@{host}/{project_id}`
    pub dsn: String,
    pub created_at: String,
}

/// Render the Sentry-compatible DSN for a project.
fn render_dsn(base_url: &str, project: &projects::Model) -> String {
    let (scheme, host) = if let Some(host) = base_url.strip_prefix("https://") {
        ("https", host)
    } else if let Some(host) = base_url.strip_prefix("http://") {
        ("http", host)
    } else {
        ("https", base_url)
    };
    let host = host.trim_end_matches('/');

    format!("{scheme}://{}@{host}/{}", project.public_key, project.id)
}

fn to_response(base_url: &str, project: projects::Model) -> ProjectResponse {
    let dsn = render_dsn(base_url, &project);
    ProjectResponse {
        id: project.id,
        name: project.name,
        slug: project.slug,
        platform: project.platform,
        public_key: project.public_key,
        dsn,
        created_at: project.created_at.to_rfc3339(),
    }
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Missing fields"),
    ),
    tag = "projects"
)]
async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, RegistryError> {
    let project = state.registry.create_project(request, user.id()).await?;

    Ok((
        StatusCode::CREATED,
        Json(to_response(&state.public_base_url, project)),
    ))
}

/// List the caller's projects
#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "Projects the caller can access", body = [ProjectResponse]),
    ),
    tag = "projects"
)]
async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<ProjectResponse>>, RegistryError> {
    let projects = state.registry.list_projects(user.id()).await?;

    Ok(Json(
        projects
            .into_iter()
            .map(|p| to_response(&state.public_base_url, p))
            .collect(),
    ))
}

/// Get a single project by slug
#[utoipa::path(
    get,
    path = "/api/projects/{slug}",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 200, description = "Project details", body = ProjectResponse),
        (status = 404, description = "Project not found"),
    ),
    tag = "projects"
)]
async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectResponse>, RegistryError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;

    Ok(Json(to_response(&state.public_base_url, project)))
}

/// Delete a project and destroy its shard
#[utoipa::path(
    delete,
    path = "/api/projects/{slug}",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found"),
    ),
    tag = "projects"
)]
async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<StatusCode, RegistryError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    state.registry.delete_project(&project.id, user.id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use faultline_database::test_utils::TestStore;

    async fn server(store: &TestStore) -> TestServer {
        let registry = Arc::new(RegistryService::new(
            store.registry.clone(),
            store.shards.clone(),
        ));
        let state = Arc::new(AppState {
            registry,
            public_base_url: "http://localhost:8030".to_string(),
        });
        // Tests bypass the bearer middleware and inject the user directly
        let app = configure_routes()
            .layer(Extension(CurrentUser("user-1".to_string())))
            .with_state(state);
        TestServer::new(app).expect("failed to build test server")
    }

    #[tokio::test]
    async fn create_then_get_project_renders_dsn() {
        let store = TestStore::new().await.unwrap();
        let server = server(&store).await;

        let response = server
            .post("/projects")
            .json(&serde_json::json!({"name": "Web App", "platform": "javascript"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let created: serde_json::Value = response.json();
        assert_eq!(created["slug"], "web-app");
        let dsn = created["dsn"].as_str().unwrap();
        assert!(dsn.starts_with("http://"));
        assert!(dsn.contains('@'));
        assert!(dsn.ends_with(created["id"].as_str().unwrap()));

        let response = server.get("/projects/web-app").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_slug_is_404_with_error_kind() {
        let store = TestStore::new().await.unwrap();
        let server = server(&store).await;

        let response = server.get("/projects/nope").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "project_not_found");
    }

    #[tokio::test]
    async fn delete_project_returns_no_content() {
        let store = TestStore::new().await.unwrap();
        let server = server(&store).await;

        server
            .post("/projects")
            .json(&serde_json::json!({"name": "Doomed"}))
            .await;
        let response = server.delete("/projects/doomed").await;
        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

        let response = server.get("/projects/doomed").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
