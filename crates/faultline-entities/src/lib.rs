//! SeaORM entities for both Faultline stores.
//!
//! The registry store holds `projects` and `project_members`; every project
//! additionally owns a shard store with `issues`, `events`, `issue_stats`
//! and `issue_users`. Shard entities never reference rows outside their own
//! shard.

pub mod events;
pub mod issue_stats;
pub mod issue_users;
pub mod issues;
pub mod project_members;
pub mod projects;
pub mod types;

pub use types::{IssueLevel, IssueStatus};
