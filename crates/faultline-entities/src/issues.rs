use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A grouped error within one project shard, keyed by fingerprint.
///
/// Timestamps are stored as canonical ISO-8601 strings (see
/// `faultline_core::time`) so the keyset cursors order lexicographically.
/// `count` and `user_count` are maintained by the ingest transaction and
/// always equal the cardinality of the owned `events` / `issue_users` rows.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub fingerprint: String,

    pub title: String,
    pub culprit: Option<String>,
    pub level: String,
    pub platform: Option<String>,

    pub first_seen: String,
    pub last_seen: String,
    pub count: i64,
    pub user_count: i64,

    pub status: String,

    /// `{type, value, filename?, function?}` mirroring the top frame.
    pub metadata: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::events::Entity")]
    Events,
    #[sea_orm(has_many = "super::issue_stats::Entity")]
    IssueStats,
    #[sea_orm(has_many = "super::issue_users::Entity")]
    IssueUsers,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::issue_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IssueStats.def()
    }
}

impl Related<super::issue_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IssueUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
