//! Shard operations: the transactional ingest hot path, issue queries and
//! the hourly-bucket aggregates.

mod ingestion;
mod issues;
mod stats;
mod types;

pub use ingestion::IngestionService;
pub use issues::IssueQueryService;
pub use stats::StatsService;
pub use types::{
    EventPage, IngestOutcome, IssueDetail, IssueFilter, IssuePage, IssueSort, StatsInterval,
    StatsPoint, StatsSummary, TrackingError, UpdateIssue,
};
