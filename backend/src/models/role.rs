//! Role and permission models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role entity: a named set of permission references
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub permission_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Attach a permission. Returns false when it was already attached.
    pub fn add_permission(&mut self, permission_id: Uuid) -> bool {
        if self.permission_ids.contains(&permission_id) {
            return false;
        }
        self.permission_ids.push(permission_id);
        true
    }

    /// Detach a permission. Returns false when it was not attached.
    pub fn remove_permission(&mut self, permission_id: Uuid) -> bool {
        let before = self.permission_ids.len();
        self.permission_ids.retain(|id| *id != permission_id);
        self.permission_ids.len() != before
    }
}

/// Permission entity: a leaf capability identified by its slug
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
