//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// User entity
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    /// Absent for accounts created through external identity login
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Attach a role. Returns false when it was already attached.
    pub fn add_role(&mut self, role_id: Uuid) -> bool {
        if self.role_ids.contains(&role_id) {
            return false;
        }
        self.role_ids.push(role_id);
        true
    }

    /// Detach a role. Returns false when it was not attached.
    pub fn remove_role(&mut self, role_id: Uuid) -> bool {
        let before = self.role_ids.len();
        self.role_ids.retain(|id| *id != role_id);
        self.role_ids.len() != before
    }
}
