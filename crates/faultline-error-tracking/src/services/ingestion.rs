//! The ingest hot path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use faultline_core::time::{floor_hour, format_ts, parse_ts};
use faultline_database::ShardManager;
use faultline_entities::{events, issue_stats, issue_users, issues, IssueStatus};

use crate::grouping::group_event;
use crate::protocol::normalize_event_id;
use crate::services::types::{IngestOutcome, TrackingError};

const USER_HASH_HEX_LEN: usize = 32;

/// Writes events into project shards.
///
/// Each event is one write transaction under the shard's write lock: the
/// issue upsert, event insert, hourly-bucket bump and user bookkeeping
/// either all commit or none do. A duplicate event id short-circuits to
/// idempotent success without touching any counter.
pub struct IngestionService {
    shards: Arc<ShardManager>,
}

impl IngestionService {
    pub fn new(shards: Arc<ShardManager>) -> Self {
        Self { shards }
    }

    pub async fn ingest(
        &self,
        project_id: &str,
        payload: Value,
    ) -> Result<IngestOutcome, TrackingError> {
        let shard = self.shards.shard(project_id).await?;

        let now = Utc::now();
        let event_id = payload
            .get("event_id")
            .and_then(Value::as_str)
            .and_then(normalize_event_id)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let timestamp = payload
            .get("timestamp")
            .and_then(parse_event_timestamp)
            .unwrap_or(now);

        let grouping = group_event(&payload);
        let user = extract_user(&payload);

        let _guard = shard.write_lock().lock().await;
        let txn = shard.db().begin().await?;

        // Retried deliveries reuse the event id; treat them as idempotent
        // success and leave the original event and counters intact.
        if let Some(existing) = events::Entity::find_by_id(event_id.clone()).one(&txn).await? {
            txn.commit().await?;
            tracing::debug!(event_id = %existing.id, "duplicate event id, dropping retry");
            return Ok(IngestOutcome {
                event_id: existing.id,
                issue_id: existing.issue_id,
            });
        }

        // Upsert the issue row keyed by fingerprint. `last_seen` follows the
        // server clock, so issue freshness reflects arrival order even when
        // SDK timestamps are skewed.
        let existing_issue = issues::Entity::find()
            .filter(issues::Column::Fingerprint.eq(&grouping.fingerprint))
            .one(&txn)
            .await?;

        let issue_id = match existing_issue {
            Some(issue) => {
                let issue_id = issue.id.clone();
                let count = issue.count + 1;
                let mut active = issue.into_active_model();
                active.last_seen = Set(format_ts(now));
                active.count = Set(count);
                active.update(&txn).await?;
                issue_id
            }
            None => {
                let issue_id = Uuid::new_v4().simple().to_string();
                issues::ActiveModel {
                    id: Set(issue_id.clone()),
                    fingerprint: Set(grouping.fingerprint.clone()),
                    title: Set(grouping.title.clone()),
                    culprit: Set(grouping.culprit.clone()),
                    level: Set(grouping.level.as_str().to_string()),
                    platform: Set(string_field(&payload, "platform")),
                    first_seen: Set(format_ts(now)),
                    last_seen: Set(format_ts(now)),
                    count: Set(1),
                    user_count: Set(0),
                    status: Set(IssueStatus::Unresolved.as_str().to_string()),
                    metadata: Set(grouping.metadata.clone()),
                }
                .insert(&txn)
                .await?;
                issue_id
            }
        };

        events::ActiveModel {
            id: Set(event_id.clone()),
            issue_id: Set(issue_id.clone()),
            timestamp: Set(format_ts(timestamp)),
            received_at: Set(format_ts(now)),
            level: Set(string_field(&payload, "level")),
            platform: Set(string_field(&payload, "platform")),
            environment: Set(string_field(&payload, "environment")),
            release: Set(string_field(&payload, "release")),
            transaction_name: Set(string_field(&payload, "transaction")),
            user_id: Set(user.id.clone()),
            user_email: Set(user.email.clone()),
            user_ip: Set(user.ip_address.clone()),
            tags: Set(payload.get("tags").filter(|t| !t.is_null()).cloned()),
            data: Set(payload),
        }
        .insert(&txn)
        .await?;

        // Hourly bucket keyed on the event timestamp, not arrival time
        let bucket = format_ts(floor_hour(timestamp));
        match issue_stats::Entity::find_by_id((issue_id.clone(), bucket.clone()))
            .one(&txn)
            .await?
        {
            Some(row) => {
                let count = row.count + 1;
                let mut active = row.into_active_model();
                active.count = Set(count);
                active.update(&txn).await?;
            }
            None => {
                issue_stats::ActiveModel {
                    issue_id: Set(issue_id.clone()),
                    bucket_start: Set(bucket),
                    count: Set(1),
                }
                .insert(&txn)
                .await?;
            }
        }

        // Unique-user bookkeeping, only when the event identifies a user
        if let Some(identifier) = user.identifier() {
            let user_hash = hash_user_identifier(&identifier);
            match issue_users::Entity::find_by_id((issue_id.clone(), user_hash.clone()))
                .one(&txn)
                .await?
            {
                Some(row) => {
                    let mut active = row.into_active_model();
                    active.last_seen = Set(format_ts(now));
                    active.update(&txn).await?;
                }
                None => {
                    issue_users::ActiveModel {
                        issue_id: Set(issue_id.clone()),
                        user_hash: Set(user_hash),
                        first_seen: Set(format_ts(now)),
                        last_seen: Set(format_ts(now)),
                    }
                    .insert(&txn)
                    .await?;

                    if let Some(issue) = issues::Entity::find_by_id(issue_id.clone())
                        .one(&txn)
                        .await?
                    {
                        let user_count = issue.user_count + 1;
                        let mut active = issue.into_active_model();
                        active.user_count = Set(user_count);
                        active.update(&txn).await?;
                    }
                }
            }
        }

        txn.commit().await?;

        Ok(IngestOutcome { event_id, issue_id })
    }
}

/// SDK timestamps arrive as epoch seconds (possibly fractional) or ISO-8601
/// strings.
fn parse_event_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            DateTime::from_timestamp_millis((secs * 1000.0) as i64)
        }
        Value::String(s) => parse_ts(s),
        _ => None,
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Default)]
struct EventUser {
    id: Option<String>,
    email: Option<String>,
    ip_address: Option<String>,
    username: Option<String>,
}

impl EventUser {
    /// The first non-empty identifier, in the fixed `id | email | ip |
    /// username` order the user hash is defined over.
    fn identifier(&self) -> Option<String> {
        [&self.id, &self.email, &self.ip_address, &self.username]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .cloned()
    }
}

fn extract_user(payload: &Value) -> EventUser {
    let Some(user) = payload.get("user") else {
        return EventUser::default();
    };

    let field = |key: &str| -> Option<String> {
        match user.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    };

    EventUser {
        id: field("id"),
        email: field("email"),
        ip_address: field("ip_address"),
        username: field("username"),
    }
}

fn hash_user_identifier(identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..USER_HASH_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_identifier_priority_is_id_email_ip_username() {
        let user = extract_user(&json!({"user": {
            "id": "u1", "email": "a@b.c", "ip_address": "1.2.3.4", "username": "al"
        }}));
        assert_eq!(user.identifier().as_deref(), Some("u1"));

        let user = extract_user(&json!({"user": {"email": "a@b.c", "username": "al"}}));
        assert_eq!(user.identifier().as_deref(), Some("a@b.c"));

        let user = extract_user(&json!({"user": {"username": "al"}}));
        assert_eq!(user.identifier().as_deref(), Some("al"));

        assert_eq!(extract_user(&json!({})).identifier(), None);
        assert_eq!(extract_user(&json!({"user": {}})).identifier(), None);
    }

    #[test]
    fn numeric_user_ids_are_stringified() {
        let user = extract_user(&json!({"user": {"id": 42}}));
        assert_eq!(user.identifier().as_deref(), Some("42"));
    }

    #[test]
    fn user_hash_is_a_32_hex_sha256_prefix() {
        let hash = hash_user_identifier("u1");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_user_identifier("u1"));
        assert_ne!(hash, hash_user_identifier("u2"));
    }

    #[test]
    fn timestamps_parse_from_epoch_and_iso() {
        let from_epoch = parse_event_timestamp(&json!(1687962600.5)).unwrap();
        assert_eq!(from_epoch.timestamp_millis(), 1_687_962_600_500);

        let from_iso = parse_event_timestamp(&json!("2023-06-28T14:30:00Z")).unwrap();
        assert_eq!(from_iso.timestamp(), 1_687_962_600);

        assert!(parse_event_timestamp(&json!(null)).is_none());
        assert!(parse_event_timestamp(&json!("yesterday")).is_none());
    }
}
