use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::{DbErr, FromQueryResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use faultline_core::error::{error_response, internal_error_response, kind};
use faultline_database::StoreError;
use faultline_entities::{events, issues, IssueLevel, IssueStatus};

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("issue not found")]
    IssueNotFound,

    #[error("event not found")]
    EventNotFound,

    #[error("no updates supplied")]
    NoUpdates,

    #[error("{0}")]
    InvalidField(String),
}

impl IntoResponse for TrackingError {
    fn into_response(self) -> Response {
        match self {
            TrackingError::IssueNotFound => error_response(
                StatusCode::NOT_FOUND,
                kind::ISSUE_NOT_FOUND,
                "issue not found",
            ),
            TrackingError::EventNotFound => error_response(
                StatusCode::NOT_FOUND,
                kind::EVENT_NOT_FOUND,
                "event not found",
            ),
            TrackingError::NoUpdates => error_response(
                StatusCode::BAD_REQUEST,
                kind::NO_UPDATES,
                "no updates supplied",
            ),
            TrackingError::InvalidField(message) => {
                error_response(StatusCode::BAD_REQUEST, kind::MISSING_FIELDS, &message)
            }
            TrackingError::Database(err) => {
                tracing::error!(error = %err, "shard database error");
                internal_error_response()
            }
            TrackingError::Store(err) => {
                tracing::error!(error = %err, "shard storage error");
                internal_error_response()
            }
        }
    }
}

/// Result of one ingested event.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub event_id: String,
    pub issue_id: String,
}

/// Sort field for issue listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssueSort {
    #[default]
    LastSeen,
    FirstSeen,
    Count,
}

impl IssueSort {
    /// Lenient parse: unknown values fall back to the default sort.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("first_seen") => Self::FirstSeen,
            Some("count") => Self::Count,
            _ => Self::LastSeen,
        }
    }
}

/// Filters for `get_issues`.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub level: Option<IssueLevel>,
    /// Case-insensitive substring match against title or culprit.
    pub query: Option<String>,
    /// Keep only issues that have at least one event in this environment.
    pub environment: Option<String>,
    pub sort: IssueSort,
    pub cursor: Option<String>,
    pub limit: Option<u64>,
}

/// One keyset page of issues.
#[derive(Debug)]
pub struct IssuePage {
    pub issues: Vec<issues::Model>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// One keyset page of events.
#[derive(Debug)]
pub struct EventPage {
    pub events: Vec<events::Model>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// An issue plus its recent hourly buckets (up to 7×24, ascending).
#[derive(Debug)]
pub struct IssueDetail {
    pub issue: issues::Model,
    pub stats: Vec<StatsPoint>,
}

/// Mutable issue fields. Only `status` exists today; an empty body is a
/// `no_updates` error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateIssue {
    pub status: Option<String>,
}

/// One hourly bucket in a stats series.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct StatsPoint {
    pub bucket: String,
    pub count: i64,
}

/// Aggregated stats over a time window.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsSummary {
    pub total: i64,
    pub series: Vec<StatsPoint>,
}

/// Stats interval. Only affects the default window when no explicit
/// `start`/`end` is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatsInterval {
    Hour,
    #[default]
    Day,
    Week,
}

impl StatsInterval {
    /// Lenient parse of `1h` / `1d` / `1w`; anything else is the default.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("1h") => Self::Hour,
            Some("1w") => Self::Week,
            _ => Self::Day,
        }
    }

    /// Default window length when the caller gives no explicit range.
    pub fn default_window(&self) -> chrono::Duration {
        match self {
            Self::Hour | Self::Day => chrono::Duration::days(1),
            Self::Week => chrono::Duration::days(7),
        }
    }
}
