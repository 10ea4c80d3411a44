//! Roles and their permission sets.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Role;
use crate::services::slug::{dedupe, slugify};
use crate::services::worker_pool::{Task, WorkerPool};
use crate::store::{ListQuery, Pagination, PermissionStore, RoleStore, Stores, UserStore};

/// Pulls a deleted role out of every user that still references it.
pub struct RemoveRoleFromUsers {
    users: Arc<dyn UserStore>,
    role_id: Uuid,
}

#[async_trait]
impl Task for RemoveRoleFromUsers {
    fn name(&self) -> &'static str {
        "remove_role_from_users"
    }

    async fn execute(&self) -> Result<()> {
        let touched = self.users.remove_role_from_all(self.role_id).await?;
        tracing::info!(role_id = %self.role_id, users = touched, "Role detached from users");
        Ok(())
    }
}

pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    users: Arc<dyn UserStore>,
    worker_pool: Arc<WorkerPool>,
    config: Arc<Config>,
}

impl RoleService {
    pub fn new(stores: &Stores, worker_pool: Arc<WorkerPool>, config: Arc<Config>) -> Self {
        Self {
            roles: stores.roles.clone(),
            permissions: stores.permissions.clone(),
            users: stores.users.clone(),
            worker_pool,
            config,
        }
    }

    pub async fn list(&self, query: ListQuery) -> Result<(Vec<Role>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.roles.list(&query).await
    }

    /// Create a role; its slug is derived from the name and numbered when taken.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<Role> {
        let base = slugify(name);
        if base.is_empty() {
            return Err(AppError::Validation("name must contain letters or digits".into()));
        }
        let taken = self.roles.taken_slugs(&base).await?;

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: dedupe(base, &taken),
            permission_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.roles.create(&role).await?;
        tracing::info!(role_id = %role.id, slug = %role.slug, "Role created");
        Ok(role)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Role> {
        self.roles.get_by_id(id).await
    }

    /// Rename a role. The slug stays as it was created.
    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, name: &str) -> Result<Role> {
        let mut role = self.roles.get_by_id(id).await?;
        role.name = name.to_string();
        role.updated_at = Utc::now();
        self.roles.update(&role).await?;
        Ok(role)
    }

    /// Delete a role and schedule its removal from every user.
    ///
    /// The delete stands even when the cleanup cannot be queued; users
    /// keep a dangling id that role lookups skip.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.roles.delete(id).await?;
        let cleanup = RemoveRoleFromUsers {
            users: self.users.clone(),
            role_id: id,
        };
        if let Err(e) = self.worker_pool.submit(Box::new(cleanup)).await {
            tracing::error!(role_id = %id, error = %e, "Failed to schedule role cleanup");
        }
        Ok(())
    }

    /// Attach a permission; already attached permissions leave the role unchanged.
    #[instrument(skip(self))]
    pub async fn add_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<Role> {
        let mut role = self.roles.get_by_id(role_id).await?;
        self.permissions.get_by_id(permission_id).await?;
        if !role.add_permission(permission_id) {
            return Ok(role);
        }
        role.updated_at = Utc::now();
        self.roles.update(&role).await?;
        Ok(role)
    }

    /// Detach a permission; detaching one that is not attached is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<Role> {
        let mut role = self.roles.get_by_id(role_id).await?;
        if !role.remove_permission(permission_id) {
            return Ok(role);
        }
        role.updated_at = Utc::now();
        self.roles.update(&role).await?;
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::services::test_support::harness;
    use crate::services::user_service::NewUser;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_slug_collisions_are_numbered() {
        let h = harness();
        let first = h.services.roles.create("Admin").await.unwrap();
        let second = h.services.roles.create("admin").await.unwrap();
        let third = h.services.roles.create("ADMIN!").await.unwrap();
        assert_eq!(first.slug, "admin");
        assert_eq!(second.slug, "admin-2");
        assert_eq!(third.slug, "admin-3");
    }

    #[tokio::test]
    async fn test_numbered_slug_taken_before_base() {
        let h = harness();
        let numbered = h.services.roles.create("Admin 2").await.unwrap();
        let base = h.services.roles.create("Admin").await.unwrap();
        let next = h.services.roles.create("Admin").await.unwrap();
        assert_eq!(numbered.slug, "admin-2");
        assert_eq!(base.slug, "admin");
        assert_eq!(next.slug, "admin-3");
    }

    #[tokio::test]
    async fn test_deleted_suffix_is_reused() {
        let h = harness();
        h.services.roles.create("Admin").await.unwrap();
        let second = h.services.roles.create("Admin").await.unwrap();
        h.services.roles.create("Admin").await.unwrap();

        h.services.roles.delete(second.id).await.unwrap();
        let again = h.services.roles.create("Admin").await.unwrap();
        assert_eq!(again.slug, "admin-2");
        let fourth = h.services.roles.create("Admin").await.unwrap();
        assert_eq!(fourth.slug, "admin-4");
    }

    #[tokio::test]
    async fn test_rename_keeps_slug() {
        let h = harness();
        let role = h.services.roles.create("Support").await.unwrap();
        let renamed = h.services.roles.update(role.id, "Customer care").await.unwrap();
        assert_eq!(renamed.name, "Customer care");
        assert_eq!(renamed.slug, "support");
    }

    #[tokio::test]
    async fn test_add_existing_permission_returns_role_unchanged() {
        let h = harness();
        let role = h.services.roles.create("Admin").await.unwrap();
        let permission = h.services.permissions.create("Role edit", None).await.unwrap();

        let once = h.services.roles.add_permission(role.id, permission.id).await.unwrap();
        let twice = h.services.roles.add_permission(role.id, permission.id).await.unwrap();
        assert_eq!(once.permission_ids, vec![permission.id]);
        assert_eq!(twice.permission_ids.len(), 1);
        assert_eq!(twice.updated_at, once.updated_at);
    }

    #[tokio::test]
    async fn test_add_unknown_permission_is_not_found() {
        let h = harness();
        let role = h.services.roles.create("Admin").await.unwrap();
        let err = h
            .services
            .roles
            .add_permission(role.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_detaches_role_from_users_in_background() {
        let h = harness();
        let role = h.services.roles.create("Temp").await.unwrap();
        let user = h
            .services
            .users
            .create(NewUser {
                email: "temp@test.com".into(),
                name: "Temp".into(),
                password: "password".into(),
            })
            .await
            .unwrap();
        h.services.users.add_role(user.id, role.id).await.unwrap();

        h.services.roles.delete(role.id).await.unwrap();
        h.worker_pool.shutdown().await;

        let user = h.services.users.get_by_id(user.id).await.unwrap();
        assert!(user.role_ids.is_empty());
        let err = h.services.roles.get_by_id(role.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_cleanup_cannot_be_queued() {
        let h = harness();
        let role = h.services.roles.create("Temp").await.unwrap();
        h.worker_pool.shutdown().await;

        h.services.roles.delete(role.id).await.unwrap();
        let err = h.services.roles.get_by_id(role.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
