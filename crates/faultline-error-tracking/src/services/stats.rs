//! Project-level stats aggregation over the hourly buckets.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseBackend, FromQueryResult, Statement};

use faultline_core::time::{format_ts, UtcDateTime};
use faultline_database::ShardManager;

use crate::services::types::{StatsInterval, StatsPoint, StatsSummary, TrackingError};

pub struct StatsService {
    shards: Arc<ShardManager>,
}

impl StatsService {
    pub fn new(shards: Arc<ShardManager>) -> Self {
        Self { shards }
    }

    /// Aggregate bucket counts over a time window, ascending by bucket.
    /// `interval` only picks the default window when `start`/`end` are
    /// omitted.
    pub async fn get_stats(
        &self,
        project_id: &str,
        interval: StatsInterval,
        start: Option<UtcDateTime>,
        end: Option<UtcDateTime>,
    ) -> Result<StatsSummary, TrackingError> {
        let shard = self.shards.shard(project_id).await?;

        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or_else(|| end - interval.default_window());

        let series = StatsPoint::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            r#"
            SELECT bucket_start AS bucket, SUM("count") AS count
            FROM issue_stats
            WHERE bucket_start >= ? AND bucket_start <= ?
            GROUP BY bucket_start
            ORDER BY bucket_start ASC
            "#,
            [format_ts(start).into(), format_ts(end).into()],
        ))
        .all(shard.db())
        .await?;

        let total = series.iter().map(|point| point.count).sum();

        Ok(StatsSummary { total, series })
    }
}
