//! Seam to the external identity service.
//!
//! Faultline does not own users or sessions; the management surface only
//! needs "which user is this bearer token". Deployments plug their identity
//! service in through this trait.

use async_trait::async_trait;

/// Resolves a bearer token to a user id, or `None` when the token is unknown.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_user(&self, token: &str) -> Option<String>;
}

/// The authenticated caller, inserted as a request extension by the auth
/// middleware and consumed by the management handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}
