//! Quantified shard invariants checked straight against the store after
//! arbitrary ingest/update/delete sequences.

use std::collections::HashSet;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};

use faultline_database::test_utils::TestStore;
use faultline_entities::{events, issue_stats, issue_users, issues};
use faultline_error_tracking::services::{
    IngestionService, IssueFilter, IssueQueryService, IssueSort, UpdateIssue,
};

const PROJECT: &str = "proj-1";

async fn ingest_burst(store: &TestStore, payloads: &[Value]) -> IngestionService {
    let service = IngestionService::new(store.shards.clone());
    for payload in payloads {
        service.ingest(PROJECT, payload.clone()).await.unwrap();
    }
    service
}

fn exception(ty: &str, value: &str) -> Value {
    json!({"exception": {"values": [{"type": ty, "value": value}]}})
}

fn with_user(mut payload: Value, user_id: &str) -> Value {
    payload["user"] = json!({"id": user_id});
    payload
}

/// count == events, sum(buckets) == count, user_count == user rows, and
/// fingerprints are unique, for every issue in the shard.
async fn assert_invariants(store: &TestStore) {
    let shard = store.shards.shard(PROJECT).await.unwrap();
    let all_issues = issues::Entity::find().all(shard.db()).await.unwrap();

    let mut fingerprints = HashSet::new();
    for issue in &all_issues {
        assert!(
            fingerprints.insert(issue.fingerprint.clone()),
            "duplicate fingerprint {}",
            issue.fingerprint
        );

        let event_count = events::Entity::find()
            .filter(events::Column::IssueId.eq(&issue.id))
            .count(shard.db())
            .await
            .unwrap() as i64;
        assert_eq!(issue.count, event_count, "count mismatch for {}", issue.id);

        let bucket_sum: i64 = issue_stats::Entity::find()
            .filter(issue_stats::Column::IssueId.eq(&issue.id))
            .all(shard.db())
            .await
            .unwrap()
            .iter()
            .map(|b| b.count)
            .sum();
        assert_eq!(issue.count, bucket_sum, "bucket sum mismatch for {}", issue.id);

        let user_rows = issue_users::Entity::find()
            .filter(issue_users::Column::IssueId.eq(&issue.id))
            .count(shard.db())
            .await
            .unwrap() as i64;
        assert_eq!(issue.user_count, user_rows, "user rows mismatch for {}", issue.id);

        assert!(issue.first_seen <= issue.last_seen);
        assert!(["unresolved", "resolved", "ignored"].contains(&issue.status.as_str()));
    }
}

#[tokio::test]
async fn counters_stay_consistent_through_a_mixed_burst() {
    let store = TestStore::new().await.unwrap();

    let mut payloads = Vec::new();
    for round in 0..5 {
        payloads.push(with_user(exception("TypeError", "boom"), "u1"));
        payloads.push(with_user(exception("TypeError", "boom"), &format!("u{round}")));
        payloads.push(exception("RangeError", &format!("index {round} out of range")));
        payloads.push(json!({"message": "plain log line", "level": "info"}));
    }
    ingest_burst(&store, &payloads).await;

    assert_invariants(&store).await;
}

#[tokio::test]
async fn invariants_hold_after_updates_and_deletes() {
    let store = TestStore::new().await.unwrap();
    ingest_burst(
        &store,
        &[
            with_user(exception("A", "first"), "u1"),
            with_user(exception("A", "first"), "u2"),
            with_user(exception("B", "second"), "u1"),
            exception("C", "third"),
        ],
    )
    .await;

    let queries = IssueQueryService::new(store.shards.clone());
    let page = queries
        .get_issues(PROJECT, IssueFilter::default())
        .await
        .unwrap();
    assert_eq!(page.issues.len(), 3);

    // Resolve one, delete another
    let resolved_id = page.issues[0].id.clone();
    queries
        .update_issue(
            PROJECT,
            &resolved_id,
            UpdateIssue {
                status: Some("resolved".to_string()),
            },
        )
        .await
        .unwrap();
    let deleted_id = page.issues[1].id.clone();
    queries.delete_issue(PROJECT, &deleted_id).await.unwrap();

    // Cascade removed exactly the deleted issue's rows
    let shard = store.shards.shard(PROJECT).await.unwrap();
    for orphan_count in [
        events::Entity::find()
            .filter(events::Column::IssueId.eq(&deleted_id))
            .count(shard.db())
            .await
            .unwrap(),
        issue_stats::Entity::find()
            .filter(issue_stats::Column::IssueId.eq(&deleted_id))
            .count(shard.db())
            .await
            .unwrap(),
        issue_users::Entity::find()
            .filter(issue_users::Column::IssueId.eq(&deleted_id))
            .count(shard.db())
            .await
            .unwrap(),
    ] {
        assert_eq!(orphan_count, 0);
    }

    assert_invariants(&store).await;
}

#[tokio::test]
async fn shards_are_isolated_per_project() {
    let store = TestStore::new().await.unwrap();
    let service = IngestionService::new(store.shards.clone());

    service
        .ingest("project-a", exception("OnlyInA", "boom"))
        .await
        .unwrap();
    service
        .ingest("project-b", exception("OnlyInB", "boom"))
        .await
        .unwrap();

    let queries = IssueQueryService::new(store.shards.clone());
    let a = queries
        .get_issues("project-a", IssueFilter::default())
        .await
        .unwrap();
    let b = queries
        .get_issues("project-b", IssueFilter::default())
        .await
        .unwrap();

    assert_eq!(a.issues.len(), 1);
    assert_eq!(b.issues.len(), 1);
    assert!(a.issues[0].title.starts_with("OnlyInA"));
    assert!(b.issues[0].title.starts_with("OnlyInB"));
}

#[tokio::test]
async fn count_sort_pages_with_numeric_cursors() {
    let store = TestStore::new().await.unwrap();

    let mut payloads = Vec::new();
    for (ty, occurrences) in [("A", 5), ("B", 3), ("C", 1)] {
        for _ in 0..occurrences {
            payloads.push(exception(ty, "boom"));
        }
    }
    ingest_burst(&store, &payloads).await;

    let queries = IssueQueryService::new(store.shards.clone());
    let first = queries
        .get_issues(
            PROJECT,
            IssueFilter {
                sort: IssueSort::Count,
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.issues.len(), 2);
    assert_eq!(first.issues[0].count, 5);
    assert_eq!(first.issues[1].count, 3);
    assert!(first.has_more);
    assert_eq!(first.next_cursor.as_deref(), Some("3"));

    let second = queries
        .get_issues(
            PROJECT,
            IssueFilter {
                sort: IssueSort::Count,
                cursor: first.next_cursor,
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.issues.len(), 1);
    assert_eq!(second.issues[0].count, 1);
    assert!(!second.has_more);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn event_pages_concatenate_without_duplicates() {
    let store = TestStore::new().await.unwrap();

    let mut payloads = Vec::new();
    for hour in 10..16 {
        let mut payload = exception("Paged", "boom");
        payload["timestamp"] = json!(format!("2024-05-01T{hour:02}:00:00Z"));
        payloads.push(payload);
    }
    ingest_burst(&store, &payloads).await;

    let queries = IssueQueryService::new(store.shards.clone());
    let issue_id = queries
        .get_issues(PROJECT, IssueFilter::default())
        .await
        .unwrap()
        .issues[0]
        .id
        .clone();

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = queries
            .get_issue_events(PROJECT, &issue_id, cursor.clone(), Some(2))
            .await
            .unwrap();
        for event in &page.events {
            seen.push(event.timestamp.clone());
        }
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    assert_eq!(seen.len(), 6);
    // Strictly descending, no duplicates, nothing skipped
    assert!(seen.windows(2).all(|w| w[0] > w[1]));
}
