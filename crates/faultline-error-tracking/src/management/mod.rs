//! Dashboard-facing management endpoints under `/api/projects/{slug}/…`.
//!
//! Every request resolves the slug against the Project Registry in the
//! context of the authenticated user before touching the shard; a caller
//! without access sees 404, never 403.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, OpenApi, ToSchema};

use faultline_core::time::parse_ts;
use faultline_core::CurrentUser;
use faultline_entities::{events, issues};
use faultline_projects::{ProjectRegistry, RegistryError};

use crate::services::{
    IssueFilter, IssueQueryService, IssueSort, StatsInterval, StatsPoint, StatsService,
    StatsSummary, TrackingError, UpdateIssue,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        list_issues,
        get_issue,
        update_issue,
        delete_issue,
        list_issue_events,
        get_event,
        latest_events,
        project_stats,
    ),
    components(schemas(
        IssueResponse,
        IssueListResponse,
        IssueDetailResponse,
        EventListResponse,
        EventResponse,
        EventSummaryResponse,
        UpdateIssue,
        StatsPoint,
        StatsSummary,
    )),
    tags(
        (name = "issues", description = "Issue browsing and triage endpoints")
    )
)]
pub struct ManagementApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn ProjectRegistry>,
    pub issues: Arc<IssueQueryService>,
    pub stats: Arc<StatsService>,
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects/{slug}/issues", get(list_issues))
        .route(
            "/projects/{slug}/issues/{issue_id}",
            get(get_issue)
                .patch(update_issue)
                .put(update_issue)
                .delete(delete_issue),
        )
        .route(
            "/projects/{slug}/issues/{issue_id}/events",
            get(list_issue_events),
        )
        .route("/projects/{slug}/events/latest", get(latest_events))
        .route("/projects/{slug}/events/{event_id}", get(get_event))
        .route("/projects/{slug}/stats", get(project_stats))
}

// ===== Errors =====

#[derive(Debug)]
enum FacadeError {
    Registry(RegistryError),
    Tracking(TrackingError),
}

impl From<RegistryError> for FacadeError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<TrackingError> for FacadeError {
    fn from(err: TrackingError) -> Self {
        Self::Tracking(err)
    }
}

impl IntoResponse for FacadeError {
    fn into_response(self) -> Response {
        match self {
            Self::Registry(err) => err.into_response(),
            Self::Tracking(err) => err.into_response(),
        }
    }
}

// ===== Request/Response types =====

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIssuesQuery {
    pub status: Option<String>,
    pub level: Option<String>,
    pub environment: Option<String>,
    /// Case-insensitive substring over title and culprit
    pub query: Option<String>,
    /// `last_seen` (default), `first_seen` or `count`
    pub sort: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CursorQuery {
    pub cursor: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LatestEventsQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsQuery {
    /// `1h`, `1d` or `1w`; only picks the default window
    pub interval: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueResponse {
    pub id: String,
    pub fingerprint: String,
    pub title: String,
    pub culprit: Option<String>,
    pub level: String,
    pub platform: Option<String>,
    pub first_seen: String,
    pub last_seen: String,
    pub count: i64,
    pub user_count: i64,
    pub status: String,
    pub metadata: Value,
}

impl From<issues::Model> for IssueResponse {
    fn from(issue: issues::Model) -> Self {
        Self {
            id: issue.id,
            fingerprint: issue.fingerprint,
            title: issue.title,
            culprit: issue.culprit,
            level: issue.level,
            platform: issue.platform,
            first_seen: issue.first_seen,
            last_seen: issue.last_seen,
            count: issue.count,
            user_count: issue.user_count,
            status: issue.status,
            metadata: issue.metadata,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueListResponse {
    pub issues: Vec<IssueResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueDetailResponse {
    #[serde(flatten)]
    pub issue: IssueResponse,
    /// Up to 7×24 most recent hourly buckets, ascending
    pub stats: Vec<StatsPoint>,
}

/// Events of an issue: the stored payloads, unmodified.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    pub events: Vec<Value>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub event: Value,
    pub issue_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventSummaryResponse {
    pub id: String,
    pub issue_id: String,
    pub timestamp: String,
    pub received_at: String,
    pub level: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub data: Value,
}

impl From<events::Model> for EventSummaryResponse {
    fn from(event: events::Model) -> Self {
        Self {
            id: event.id,
            issue_id: event.issue_id,
            timestamp: event.timestamp,
            received_at: event.received_at,
            level: event.level,
            environment: event.environment,
            release: event.release,
            data: event.data,
        }
    }
}

fn parse_status(raw: Option<String>) -> Result<Option<faultline_entities::IssueStatus>, FacadeError> {
    raw.map(|s| {
        s.parse()
            .map_err(|e: String| TrackingError::InvalidField(e).into())
    })
    .transpose()
}

fn parse_level(raw: Option<String>) -> Result<Option<faultline_entities::IssueLevel>, FacadeError> {
    raw.map(|l| {
        l.parse()
            .map_err(|e: String| TrackingError::InvalidField(e).into())
    })
    .transpose()
}

fn parse_bound(raw: Option<String>, name: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>, FacadeError> {
    raw.map(|s| {
        parse_ts(&s).ok_or_else(|| {
            TrackingError::InvalidField(format!("invalid {name} timestamp")).into()
        })
    })
    .transpose()
}

// ===== Handlers =====

/// List issues with filters and keyset pagination
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/issues",
    params(("slug" = String, Path, description = "Project slug"), ListIssuesQuery),
    responses(
        (status = 200, description = "One page of issues", body = IssueListResponse),
        (status = 404, description = "Project not found"),
    ),
    tag = "issues"
)]
async fn list_issues(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<ListIssuesQuery>,
) -> Result<Json<IssueListResponse>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;

    let filter = IssueFilter {
        status: parse_status(query.status)?,
        level: parse_level(query.level)?,
        query: query.query,
        environment: query.environment,
        sort: IssueSort::parse(query.sort.as_deref()),
        cursor: query.cursor,
        limit: query.limit,
    };

    let page = state.issues.get_issues(&project.id, filter).await?;

    Ok(Json(IssueListResponse {
        issues: page.issues.into_iter().map(IssueResponse::from).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

/// Get one issue with its recent hourly buckets
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/issues/{issue_id}",
    params(
        ("slug" = String, Path, description = "Project slug"),
        ("issue_id" = String, Path, description = "Issue ID"),
    ),
    responses(
        (status = 200, description = "Issue details", body = IssueDetailResponse),
        (status = 404, description = "Project or issue not found"),
    ),
    tag = "issues"
)]
async fn get_issue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, issue_id)): Path<(String, String)>,
) -> Result<Json<IssueDetailResponse>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    let detail = state.issues.get_issue(&project.id, &issue_id).await?;

    Ok(Json(IssueDetailResponse {
        issue: detail.issue.into(),
        stats: detail.stats,
    }))
}

/// Update an issue's status
#[utoipa::path(
    patch,
    path = "/api/projects/{slug}/issues/{issue_id}",
    params(
        ("slug" = String, Path, description = "Project slug"),
        ("issue_id" = String, Path, description = "Issue ID"),
    ),
    request_body = UpdateIssue,
    responses(
        (status = 200, description = "Updated issue", body = IssueResponse),
        (status = 400, description = "No updates or invalid status"),
        (status = 404, description = "Project or issue not found"),
    ),
    tag = "issues"
)]
async fn update_issue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, issue_id)): Path<(String, String)>,
    Json(update): Json<UpdateIssue>,
) -> Result<Json<IssueResponse>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    let issue = state
        .issues
        .update_issue(&project.id, &issue_id, update)
        .await?;

    Ok(Json(issue.into()))
}

/// Delete an issue and all of its data
#[utoipa::path(
    delete,
    path = "/api/projects/{slug}/issues/{issue_id}",
    params(
        ("slug" = String, Path, description = "Project slug"),
        ("issue_id" = String, Path, description = "Issue ID"),
    ),
    responses(
        (status = 204, description = "Issue deleted"),
        (status = 404, description = "Project or issue not found"),
    ),
    tag = "issues"
)]
async fn delete_issue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, issue_id)): Path<(String, String)>,
) -> Result<StatusCode, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    state.issues.delete_issue(&project.id, &issue_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List an issue's events, newest first
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/issues/{issue_id}/events",
    params(
        ("slug" = String, Path, description = "Project slug"),
        ("issue_id" = String, Path, description = "Issue ID"),
        CursorQuery,
    ),
    responses(
        (status = 200, description = "One page of event payloads", body = EventListResponse),
        (status = 404, description = "Project or issue not found"),
    ),
    tag = "issues"
)]
async fn list_issue_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, issue_id)): Path<(String, String)>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<EventListResponse>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    let page = state
        .issues
        .get_issue_events(&project.id, &issue_id, query.cursor, query.limit)
        .await?;

    Ok(Json(EventListResponse {
        events: page.events.into_iter().map(|event| event.data).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

/// Get one event by id
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/events/{event_id}",
    params(
        ("slug" = String, Path, description = "Project slug"),
        ("event_id" = String, Path, description = "Event ID"),
    ),
    responses(
        (status = 200, description = "The stored event", body = EventResponse),
        (status = 404, description = "Project or event not found"),
    ),
    tag = "issues"
)]
async fn get_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, event_id)): Path<(String, String)>,
) -> Result<Json<EventResponse>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    let event = state.issues.get_event(&project.id, &event_id).await?;

    Ok(Json(EventResponse {
        event: event.data,
        issue_id: event.issue_id,
    }))
}

/// The newest events across all issues of the project
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/events/latest",
    params(("slug" = String, Path, description = "Project slug"), LatestEventsQuery),
    responses(
        (status = 200, description = "Newest events", body = [EventSummaryResponse]),
        (status = 404, description = "Project not found"),
    ),
    tag = "issues"
)]
async fn latest_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<LatestEventsQuery>,
) -> Result<Json<Vec<EventSummaryResponse>>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;
    let events = state
        .issues
        .get_latest_events(&project.id, query.limit)
        .await?;

    Ok(Json(
        events.into_iter().map(EventSummaryResponse::from).collect(),
    ))
}

/// Aggregated hourly stats for the project
#[utoipa::path(
    get,
    path = "/api/projects/{slug}/stats",
    params(("slug" = String, Path, description = "Project slug"), StatsQuery),
    responses(
        (status = 200, description = "Bucketed event counts", body = StatsSummary),
        (status = 404, description = "Project not found"),
    ),
    tag = "issues"
)]
async fn project_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSummary>, FacadeError> {
    let project = state.registry.get_project_by_slug(&slug, user.id()).await?;

    let interval = StatsInterval::parse(query.interval.as_deref());
    let start = parse_bound(query.start, "start")?;
    let end = parse_bound(query.end, "end")?;

    let summary = state
        .stats
        .get_stats(&project.id, interval, start, end)
        .await?;

    Ok(Json(summary))
}
