use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single SDK occurrence. `data` retains the normalized payload verbatim;
/// the scalar columns beside it exist for filtering and list rendering only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub issue_id: String,

    /// SDK-supplied occurrence time (canonical ISO-8601 rendering).
    pub timestamp: String,
    /// Server arrival time; monotonic per shard regardless of SDK clock skew.
    pub received_at: String,

    pub level: Option<String>,
    pub platform: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub transaction_name: Option<String>,

    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_ip: Option<String>,

    pub tags: Option<Json>,

    /// The full normalized payload, retained verbatim.
    pub data: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issues::Entity",
        from = "Column::IssueId",
        to = "super::issues::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Issues,
}

impl Related<super::issues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
