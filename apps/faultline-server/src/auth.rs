//! Bearer-token middleware for the management surface.
//!
//! Token validation itself belongs to the external identity service; the
//! server ships a static token map as its [`IdentityProvider`], and the
//! middleware turns a valid token into the `CurrentUser` extension the
//! handlers consume.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use faultline_core::error::{error_response, kind};
use faultline_core::{CurrentUser, IdentityProvider};

/// Token → user map from configuration.
pub struct StaticTokenIdentity {
    tokens: HashMap<String, String>,
}

impl StaticTokenIdentity {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn resolve_user(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Require a valid `Authorization: Bearer` token and inject `CurrentUser`.
pub async fn require_user(
    State(identity): State<Arc<dyn IdentityProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            kind::MISSING_AUTH,
            "missing bearer token",
        );
    };

    match identity.resolve_user(token).await {
        Some(user_id) => {
            request.extensions_mut().insert(CurrentUser(user_id));
            next.run(request).await
        }
        None => error_response(
            StatusCode::UNAUTHORIZED,
            kind::INVALID_AUTH,
            "invalid bearer token",
        ),
    }
}
