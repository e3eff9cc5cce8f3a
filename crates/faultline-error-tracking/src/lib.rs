//! The Faultline core: Sentry-wire ingestion and the per-project issue
//! engine.
//!
//! - [`protocol`]: envelope codec, DSN and auth-header parsing (pure)
//! - [`grouping`]: event fingerprinting and issue metadata (pure)
//! - [`services`]: the shard operations: ingest, queries, stats
//! - [`ingest`]: SDK-facing HTTP endpoints (`/api/{project_id}/envelope`)
//! - [`management`]: dashboard-facing HTTP endpoints (`/api/projects/{slug}/...`)

pub mod grouping;
pub mod ingest;
pub mod management;
pub mod protocol;
pub mod services;

pub use protocol::{Envelope, EnvelopeError, ParsedDsn};
pub use services::{IngestionService, IssueQueryService, StatsService, TrackingError};
