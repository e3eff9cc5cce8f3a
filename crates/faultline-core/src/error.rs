//! The wire-level error envelope shared by every Faultline API surface.
//!
//! All errors leave the server as `{"error": "<kind>", "message": "<human>"}`
//! with a matching HTTP status. The `error` field is a stable machine-readable
//! kind string; messages are short and never carry internal detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Machine-readable error kinds surfaced by the core.
pub mod kind {
    pub const MISSING_AUTH: &str = "missing_auth";
    pub const INVALID_AUTH: &str = "invalid_auth";
    pub const PROJECT_MISMATCH: &str = "project_mismatch";
    pub const PARSE_FAILED: &str = "parse_failed";
    pub const DECOMPRESSION_FAILED: &str = "decompression_failed";
    pub const PROJECT_NOT_FOUND: &str = "project_not_found";
    pub const ISSUE_NOT_FOUND: &str = "issue_not_found";
    pub const EVENT_NOT_FOUND: &str = "event_not_found";
    pub const MISSING_FIELDS: &str = "missing_fields";
    pub const NO_UPDATES: &str = "no_updates";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable kind, e.g. `issue_not_found`
    #[schema(example = "issue_not_found")]
    pub error: String,
    /// Short human-readable message
    #[schema(example = "issue not found")]
    pub message: String,
}

/// Build a complete error response for the given kind.
pub fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: kind.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// The 500 every unexpected internal condition collapses to. The message is
/// generic on purpose; detail goes to the logs, not the client.
pub fn internal_error_response() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        kind::INTERNAL_ERROR,
        "internal error",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_kind_and_message() {
        let body = ErrorBody {
            error: kind::ISSUE_NOT_FOUND.to_string(),
            message: "issue not found".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "issue_not_found");
        assert_eq!(json["message"], "issue not found");
    }

    #[test]
    fn internal_error_has_generic_message() {
        let response = internal_error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
