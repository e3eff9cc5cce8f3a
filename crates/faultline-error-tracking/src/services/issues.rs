//! Issue and event queries over a project shard.

use std::sync::Arc;

use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use faultline_core::pagination::{clamp_limit, DEFAULT_LATEST_EVENTS_LIMIT, MAX_PAGE_SIZE};
use faultline_database::ShardManager;
use faultline_entities::{events, issue_stats, issue_users, issues, IssueStatus};

use crate::services::types::{
    EventPage, IssueDetail, IssueFilter, IssuePage, IssueSort, StatsPoint, TrackingError,
    UpdateIssue,
};

/// Hourly buckets returned with a single issue: the most recent 7×24.
const ISSUE_STATS_BUCKETS: u64 = 168;

/// Read and triage operations on a project shard.
pub struct IssueQueryService {
    shards: Arc<ShardManager>,
}

impl IssueQueryService {
    pub fn new(shards: Arc<ShardManager>) -> Self {
        Self { shards }
    }

    /// Keyset-paginated issue listing, newest first on the sort field.
    pub async fn get_issues(
        &self,
        project_id: &str,
        filter: IssueFilter,
    ) -> Result<IssuePage, TrackingError> {
        let shard = self.shards.shard(project_id).await?;
        let limit = clamp_limit(filter.limit);

        let mut query = issues::Entity::find();

        if let Some(status) = filter.status {
            query = query.filter(issues::Column::Status.eq(status.as_str()));
        }
        if let Some(level) = filter.level {
            query = query.filter(issues::Column::Level.eq(level.as_str()));
        }
        if let Some(text) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(issues::Column::Title.contains(text))
                    .add(issues::Column::Culprit.contains(text)),
            );
        }
        if let Some(environment) = filter.environment.as_deref().filter(|e| !e.is_empty()) {
            // Issues with at least one event in the environment
            query = query.filter(
                issues::Column::Id.in_subquery(
                    Query::select()
                        .column(events::Column::IssueId)
                        .from(events::Entity)
                        .and_where(events::Column::Environment.eq(environment))
                        .to_owned(),
                ),
            );
        }

        match filter.sort {
            IssueSort::LastSeen => {
                if let Some(cursor) = filter.cursor.as_deref() {
                    query = query.filter(issues::Column::LastSeen.lt(cursor));
                }
                query = query.order_by_desc(issues::Column::LastSeen);
            }
            IssueSort::FirstSeen => {
                if let Some(cursor) = filter.cursor.as_deref() {
                    query = query.filter(issues::Column::FirstSeen.lt(cursor));
                }
                query = query.order_by_desc(issues::Column::FirstSeen);
            }
            IssueSort::Count => {
                if let Some(cursor) = filter.cursor.as_deref() {
                    let cursor: i64 = cursor.parse().map_err(|_| {
                        TrackingError::InvalidField("invalid cursor".to_string())
                    })?;
                    query = query.filter(issues::Column::Count.lt(cursor));
                }
                query = query.order_by_desc(issues::Column::Count);
            }
        }

        // One extra row decides has_more without a COUNT query
        let mut rows = query.limit(limit + 1).all(shard.db()).await?;

        let has_more = rows.len() as u64 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }
        let next_cursor = has_more
            .then(|| rows.last())
            .flatten()
            .map(|row| match filter.sort {
                IssueSort::LastSeen => row.last_seen.clone(),
                IssueSort::FirstSeen => row.first_seen.clone(),
                IssueSort::Count => row.count.to_string(),
            });

        Ok(IssuePage {
            issues: rows,
            next_cursor,
            has_more,
        })
    }

    /// A single issue plus its recent hourly buckets, ascending.
    pub async fn get_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<IssueDetail, TrackingError> {
        let shard = self.shards.shard(project_id).await?;

        let issue = issues::Entity::find_by_id(issue_id.to_string())
            .one(shard.db())
            .await?
            .ok_or(TrackingError::IssueNotFound)?;

        let mut buckets = issue_stats::Entity::find()
            .filter(issue_stats::Column::IssueId.eq(issue_id))
            .order_by_desc(issue_stats::Column::BucketStart)
            .limit(ISSUE_STATS_BUCKETS)
            .all(shard.db())
            .await?;
        buckets.reverse();

        Ok(IssueDetail {
            issue,
            stats: buckets
                .into_iter()
                .map(|b| StatsPoint {
                    bucket: b.bucket_start,
                    count: b.count,
                })
                .collect(),
        })
    }

    /// Apply a status transition. Ingest never touches status, so a resolved
    /// issue stays resolved when it recurs.
    pub async fn update_issue(
        &self,
        project_id: &str,
        issue_id: &str,
        update: UpdateIssue,
    ) -> Result<issues::Model, TrackingError> {
        let Some(status) = update.status else {
            return Err(TrackingError::NoUpdates);
        };
        let status: IssueStatus = status
            .parse()
            .map_err(|e: String| TrackingError::InvalidField(e))?;

        let shard = self.shards.shard(project_id).await?;
        let _guard = shard.write_lock().lock().await;

        let issue = issues::Entity::find_by_id(issue_id.to_string())
            .one(shard.db())
            .await?
            .ok_or(TrackingError::IssueNotFound)?;

        let mut active = issue.into_active_model();
        active.status = Set(status.as_str().to_string());
        let updated = active.update(shard.db()).await?;

        Ok(updated)
    }

    /// Delete an issue and exactly its events, buckets and user rows.
    pub async fn delete_issue(
        &self,
        project_id: &str,
        issue_id: &str,
    ) -> Result<(), TrackingError> {
        let shard = self.shards.shard(project_id).await?;
        let _guard = shard.write_lock().lock().await;
        let txn = shard.db().begin().await?;

        let issue = issues::Entity::find_by_id(issue_id.to_string())
            .one(&txn)
            .await?
            .ok_or(TrackingError::IssueNotFound)?;

        events::Entity::delete_many()
            .filter(events::Column::IssueId.eq(&issue.id))
            .exec(&txn)
            .await?;
        issue_stats::Entity::delete_many()
            .filter(issue_stats::Column::IssueId.eq(&issue.id))
            .exec(&txn)
            .await?;
        issue_users::Entity::delete_many()
            .filter(issue_users::Column::IssueId.eq(&issue.id))
            .exec(&txn)
            .await?;
        issues::Entity::delete_by_id(issue.id.clone()).exec(&txn).await?;

        txn.commit().await?;

        tracing::info!(issue_id = %issue.id, "deleted issue");
        Ok(())
    }

    /// Keyset-paginated events of one issue, newest first.
    pub async fn get_issue_events(
        &self,
        project_id: &str,
        issue_id: &str,
        cursor: Option<String>,
        limit: Option<u64>,
    ) -> Result<EventPage, TrackingError> {
        let shard = self.shards.shard(project_id).await?;
        let limit = clamp_limit(limit);

        let issue_exists = issues::Entity::find_by_id(issue_id.to_string())
            .one(shard.db())
            .await?
            .is_some();
        if !issue_exists {
            return Err(TrackingError::IssueNotFound);
        }

        let mut query = events::Entity::find()
            .filter(events::Column::IssueId.eq(issue_id))
            .order_by_desc(events::Column::Timestamp);
        if let Some(cursor) = cursor.as_deref() {
            query = query.filter(events::Column::Timestamp.lt(cursor));
        }

        let mut rows = query.limit(limit + 1).all(shard.db()).await?;

        let has_more = rows.len() as u64 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }
        let next_cursor = has_more
            .then(|| rows.last())
            .flatten()
            .map(|row| row.timestamp.clone());

        Ok(EventPage {
            events: rows,
            next_cursor,
            has_more,
        })
    }

    /// Look up one event by id.
    pub async fn get_event(
        &self,
        project_id: &str,
        event_id: &str,
    ) -> Result<events::Model, TrackingError> {
        let shard = self.shards.shard(project_id).await?;

        events::Entity::find_by_id(event_id.to_string())
            .one(shard.db())
            .await?
            .ok_or(TrackingError::EventNotFound)
    }

    /// The newest events across all issues in the shard.
    pub async fn get_latest_events(
        &self,
        project_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<events::Model>, TrackingError> {
        let shard = self.shards.shard(project_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_LATEST_EVENTS_LIMIT)
            .clamp(1, MAX_PAGE_SIZE);

        let rows = events::Entity::find()
            .order_by_desc(events::Column::Timestamp)
            .limit(limit)
            .all(shard.db())
            .await?;

        Ok(rows)
    }
}
