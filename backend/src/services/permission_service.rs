//! Permission catalog.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Permission;
use crate::services::slug::{dedupe, slugify};
use crate::services::worker_pool::{Task, WorkerPool};
use crate::store::{ListQuery, Pagination, PermissionStore, RoleStore, Stores};

/// Pulls a deleted permission out of every role that still references it.
pub struct RemovePermissionFromRoles {
    roles: Arc<dyn RoleStore>,
    permission_id: Uuid,
}

#[async_trait]
impl Task for RemovePermissionFromRoles {
    fn name(&self) -> &'static str {
        "remove_permission_from_roles"
    }

    async fn execute(&self) -> Result<()> {
        let touched = self.roles.remove_permission_from_all(self.permission_id).await?;
        tracing::info!(permission_id = %self.permission_id, roles = touched, "Permission detached from roles");
        Ok(())
    }
}

pub struct PermissionService {
    permissions: Arc<dyn PermissionStore>,
    roles: Arc<dyn RoleStore>,
    worker_pool: Arc<WorkerPool>,
    config: Arc<Config>,
}

impl PermissionService {
    pub fn new(stores: &Stores, worker_pool: Arc<WorkerPool>, config: Arc<Config>) -> Self {
        Self {
            permissions: stores.permissions.clone(),
            roles: stores.roles.clone(),
            worker_pool,
            config,
        }
    }

    pub async fn list(&self, query: ListQuery) -> Result<(Vec<Permission>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.permissions.list(&query).await
    }

    /// Create a permission. The slug comes from `slug` when given, else from
    /// the name, and is numbered when already taken.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, slug: Option<&str>) -> Result<Permission> {
        let base = slugify(slug.unwrap_or(name));
        if base.is_empty() {
            return Err(AppError::Validation("slug must contain letters or digits".into()));
        }
        let taken = self.permissions.taken_slugs(&base).await?;

        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: dedupe(base, &taken),
            created_at: now,
            updated_at: now,
        };
        self.permissions.create(&permission).await?;
        tracing::info!(permission_id = %permission.id, slug = %permission.slug, "Permission created");
        Ok(permission)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Permission> {
        self.permissions.get_by_id(id).await
    }

    /// Edit name and slug in place. A slug already used by another
    /// permission is rejected with `AlreadyExists`.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> Result<Permission> {
        let mut permission = self.permissions.get_by_id(id).await?;
        if let Some(name) = name {
            permission.name = name.to_string();
        }
        if let Some(slug) = slug {
            let slug = slugify(slug);
            if slug.is_empty() {
                return Err(AppError::Validation("slug must contain letters or digits".into()));
            }
            permission.slug = slug;
        }
        permission.updated_at = Utc::now();
        self.permissions.update(&permission).await?;
        Ok(permission)
    }

    /// Delete a permission and schedule its removal from every role.
    ///
    /// The delete stands even when the cleanup cannot be queued; roles
    /// keep a dangling id that permission lookups skip.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.permissions.delete(id).await?;
        let cleanup = RemovePermissionFromRoles {
            roles: self.roles.clone(),
            permission_id: id,
        };
        if let Err(e) = self.worker_pool.submit(Box::new(cleanup)).await {
            tracing::error!(permission_id = %id, error = %e, "Failed to schedule permission cleanup");
        }
        Ok(())
    }
}
