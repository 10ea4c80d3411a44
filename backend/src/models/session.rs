//! Test session and drawn question models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::question::Grade;

/// Lifecycle state derived from the finish time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

/// One attempt at a batch of drawn questions
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub grade: Grade,
    /// Empty until the session is summarized
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_finished() {
            SessionStatus::Finished
        } else {
            SessionStatus::Active
        }
    }
}

/// A question copied into a session at draw time
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct SessionQuestion {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Draw order within the session
    pub position: i32,
    pub text: String,
    pub answer: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
