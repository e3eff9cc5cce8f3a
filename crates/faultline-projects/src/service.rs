use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use faultline_database::{DbConnection, ShardManager};
use faultline_entities::{project_members, projects};

use crate::types::{CreateProjectRequest, ProjectRegistry, RegistryError};

/// SeaORM-backed Project Registry.
pub struct RegistryService {
    db: Arc<DbConnection>,
    shards: Arc<ShardManager>,
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

impl RegistryService {
    pub fn new(db: Arc<DbConnection>, shards: Arc<ShardManager>) -> Self {
        Self { db, shards }
    }

    /// List the projects the user is a member of, newest first.
    pub async fn list_projects(
        &self,
        user_id: &str,
    ) -> Result<Vec<projects::Model>, RegistryError> {
        let memberships = project_members::Entity::find()
            .filter(project_members::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await?;

        let project_ids: Vec<String> = memberships.into_iter().map(|m| m.project_id).collect();
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let projects = projects::Entity::find()
            .filter(projects::Column::Id.is_in(project_ids))
            .order_by_desc(projects::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(projects)
    }

    async fn generate_unique_slug(&self, name: &str) -> Result<String, RegistryError> {
        let base = match slugify(name) {
            s if s.is_empty() => "project".to_string(),
            s => s,
        };

        let mut candidate = base.clone();
        let mut suffix = 2u32;
        loop {
            let taken = projects::Entity::find()
                .filter(projects::Column::Slug.eq(&candidate))
                .count(self.db.as_ref())
                .await?;
            if taken == 0 {
                return Ok(candidate);
            }
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
    }

    /// Generate a random key
    fn generate_key(length: usize) -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..length).map(|_| rng.gen()).collect();
        hex::encode(bytes)
    }

    async fn require_member(&self, project_id: &str, user_id: &str) -> Result<(), RegistryError> {
        let member = project_members::Entity::find_by_id((
            project_id.to_string(),
            user_id.to_string(),
        ))
        .one(self.db.as_ref())
        .await?;

        if member.is_none() {
            return Err(RegistryError::ProjectNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectRegistry for RegistryService {
    async fn get_project_by_key(
        &self,
        public_key: &str,
    ) -> Result<Option<projects::Model>, RegistryError> {
        let project = projects::Entity::find()
            .filter(projects::Column::PublicKey.eq(public_key))
            .one(self.db.as_ref())
            .await?;

        Ok(project)
    }

    async fn get_project_by_slug(
        &self,
        slug: &str,
        user_id: &str,
    ) -> Result<projects::Model, RegistryError> {
        let project = projects::Entity::find()
            .filter(projects::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await?
            .ok_or(RegistryError::ProjectNotFound)?;

        self.require_member(&project.id, user_id).await?;

        Ok(project)
    }

    async fn create_project(
        &self,
        request: CreateProjectRequest,
        user_id: &str,
    ) -> Result<projects::Model, RegistryError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::MissingFields(
                "project name is required".to_string(),
            ));
        }

        let slug = self.generate_unique_slug(&name).await?;
        let id = Uuid::new_v4().simple().to_string();
        let public_key = Self::generate_key(16);

        let project = projects::ActiveModel {
            id: Set(id.clone()),
            name: Set(name),
            slug: Set(slug),
            platform: Set(request.platform),
            public_key: Set(public_key),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        project_members::ActiveModel {
            project_id: Set(id.clone()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::info!(project_id = %id, slug = %project.slug, "created project");

        Ok(project)
    }

    async fn delete_project(&self, project_id: &str, user_id: &str) -> Result<(), RegistryError> {
        let project = projects::Entity::find_by_id(project_id.to_string())
            .one(self.db.as_ref())
            .await?
            .ok_or(RegistryError::ProjectNotFound)?;

        self.require_member(&project.id, user_id).await?;

        project_members::Entity::delete_many()
            .filter(project_members::Column::ProjectId.eq(&project.id))
            .exec(self.db.as_ref())
            .await?;
        projects::Entity::delete_by_id(project.id.clone())
            .exec(self.db.as_ref())
            .await?;

        // Registry rows are gone, so no new writes can resolve this project;
        // the shard can be destroyed without racing late ingests.
        self.shards.destroy(&project.id).await?;

        tracing::info!(project_id = %project.id, "deleted project");

        Ok(())
    }
}
