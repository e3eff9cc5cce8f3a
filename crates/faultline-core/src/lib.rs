//! Core utilities and types shared across all Faultline crates

pub mod error;
pub mod identity;
pub mod pagination;
pub mod time;

// Re-export commonly used types
pub use error::*;
pub use identity::{CurrentUser, IdentityProvider};
pub use pagination::*;
pub use time::*;

// Re-export external dependencies used across crate boundaries
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
