//! User accounts, role membership and permission resolution.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::identity_service::ExternalIdentity;
use crate::store::{
    ListQuery, Pagination, PermissionStore, RefreshTokenStore, RoleStore, Stores, UserStore,
};

/// Input for a locally registered account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Profile fields that may be edited in place
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

pub struct UserService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    config: Arc<Config>,
}

impl UserService {
    pub fn new(stores: &Stores, config: Arc<Config>) -> Self {
        Self {
            users: stores.users.clone(),
            roles: stores.roles.clone(),
            permissions: stores.permissions.clone(),
            refresh_tokens: stores.refresh_tokens.clone(),
            config,
        }
    }

    /// Hash a password using bcrypt at the given cost
    pub fn hash_password(password: &str, cost: u32) -> Result<String> {
        Ok(bcrypt::hash(password, cost)?)
    }

    /// Check a password against a stored hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    pub async fn list(&self, query: ListQuery) -> Result<(Vec<User>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.users.list(&query).await
    }

    #[instrument(skip_all, fields(email = %input.email))]
    pub async fn create(&self, input: NewUser) -> Result<User> {
        if self.users.exists_by_email(&input.email).await? {
            return Err(AppError::AlreadyExists("user".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            name: input.name,
            avatar: None,
            password_hash: Some(Self::hash_password(&input.password, self.config.bcrypt_cost)?),
            role_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.users.get_by_id(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        self.users.get_by_email(email).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let mut user = self.users.get_by_id(id).await?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = Some(avatar);
        }
        user.updated_at = Utc::now();
        self.users.update(&user).await?;
        Ok(user)
    }

    /// Delete a user and revoke their refresh token.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.refresh_tokens.delete_by_user(id).await?;
        self.users.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Attach a role. Attaching a role the user already holds returns the
    /// user unchanged.
    #[instrument(skip(self))]
    pub async fn add_role(&self, user_id: Uuid, role_id: Uuid) -> Result<User> {
        let mut user = self.users.get_by_id(user_id).await?;
        self.roles.get_by_id(role_id).await?;
        if !user.add_role(role_id) {
            return Ok(user);
        }
        user.updated_at = Utc::now();
        self.users.update(&user).await?;
        Ok(user)
    }

    /// Detach a role. Detaching a role the user does not hold is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> Result<User> {
        let mut user = self.users.get_by_id(user_id).await?;
        if !user.remove_role(role_id) {
            return Ok(user);
        }
        user.updated_at = Utc::now();
        self.users.update(&user).await?;
        Ok(user)
    }

    /// Whether any of the user's roles grants the permission with this slug.
    ///
    /// Resolved on every call: user roles, then the union of their
    /// permission ids, then the slugs of those permissions.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn has_permission(&self, user: &User, slug: &str) -> Result<bool> {
        if user.role_ids.is_empty() {
            return Ok(false);
        }

        let roles = self.roles.get_many(&user.role_ids).await?;
        let permission_ids: Vec<Uuid> = roles
            .iter()
            .flat_map(|role| role.permission_ids.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if permission_ids.is_empty() {
            return Ok(false);
        }

        let permissions = self.permissions.get_many(&permission_ids).await?;
        Ok(permissions.iter().any(|p| p.slug == slug))
    }

    /// Find the account for an external identity, refreshing its profile,
    /// or create a password-less account for it.
    #[instrument(skip_all, fields(email = %identity.email))]
    pub async fn get_or_create(&self, identity: ExternalIdentity) -> Result<User> {
        match self.users.get_by_email(&identity.email).await {
            Ok(mut user) => {
                user.name = identity.name;
                user.avatar = Some(identity.avatar);
                user.updated_at = Utc::now();
                self.users.update(&user).await?;
                Ok(user)
            }
            Err(AppError::NotFound(_)) => {
                let now = Utc::now();
                let user = User {
                    id: Uuid::new_v4(),
                    email: identity.email,
                    name: identity.name,
                    avatar: Some(identity.avatar),
                    password_hash: None,
                    role_ids: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                self.users.create(&user).await?;
                tracing::info!(user_id = %user.id, "User created from external identity");
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }
}
