//! Catalog question model and difficulty grade.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Difficulty tier shared by questions and sessions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "grade", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Junior,
    Middle,
    Senior,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Junior, Grade::Middle, Grade::Senior];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Junior => "junior",
            Grade::Middle => "middle",
            Grade::Senior => "senior",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "junior" => Ok(Grade::Junior),
            "middle" => Ok(Grade::Middle),
            "senior" => Ok(Grade::Senior),
            _ => Err(AppError::InvalidGradeValue),
        }
    }
}

/// Catalog question
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Question {
    pub id: Uuid,
    pub category_id: Uuid,
    pub grade: Grade,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
