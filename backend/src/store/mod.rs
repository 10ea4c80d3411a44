//! Persistence contracts.
//!
//! Services only see the traits in this module. Two implementations exist:
//! [`postgres::PgStore`] for production and [`memory::MemoryStore`] for local
//! runs and the test suite. Both enforce the cross-request invariants
//! (one unfinished session per user, one refresh token per user) at the
//! storage level rather than relying on check-then-act in the services.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Category, Grade, Permission, Question, RefreshToken, Role, Session, SessionQuestion, User,
};

pub mod memory;
pub mod postgres;

/// Paged, filtered and sorted list request.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u32,
    pub count: u32,
    pub filters: HashMap<String, String>,
    /// Field name to direction ("asc" or "desc")
    pub sorts: HashMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            count: 20,
            filters: HashMap::new(),
            sorts: HashMap::new(),
        }
    }
}

impl ListQuery {
    pub fn new(page: u32, count: u32) -> Self {
        Self {
            page,
            count,
            ..Default::default()
        }
    }

    pub fn filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }

    pub fn sort(mut self, field: &str, direction: &str) -> Self {
        self.sorts.insert(field.to_string(), direction.to_string());
        self
    }

    /// Clamp page to at least 1 and count into `[1, max]`.
    pub fn clamped(mut self, max: u32) -> Self {
        self.page = self.page.max(1);
        self.count = self.count.clamp(1, max.max(1));
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.count)
    }
}

/// How a filter value is compared against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Case-insensitive substring
    Contains,
    Exact,
    /// Exact match on a grade; ignored when the value is not a valid grade
    Grade,
    /// Exact match on a UUID; ignored when the value does not parse
    Id,
}

/// Per-entity whitelist of filterable and sortable columns.
#[derive(Debug)]
pub struct ListSpec {
    pub filters: &'static [(&'static str, Match)],
    pub sorts: &'static [&'static str],
}

/// A filter that survived the whitelist, with its value normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFilter {
    Contains(&'static str, String),
    Exact(&'static str, String),
    Grade(&'static str, Grade),
    Id(&'static str, Uuid),
}

impl ListSpec {
    /// Filters from the query that are allowed for this entity, in a stable order.
    pub fn resolve_filters(&self, query: &ListQuery) -> Vec<ResolvedFilter> {
        self.filters
            .iter()
            .filter_map(|(field, kind)| {
                let value = query.filters.get(*field)?.trim();
                if value.is_empty() {
                    return None;
                }
                match kind {
                    Match::Contains => Some(ResolvedFilter::Contains(field, value.to_lowercase())),
                    Match::Exact => Some(ResolvedFilter::Exact(field, value.to_string())),
                    Match::Grade => value
                        .parse::<Grade>()
                        .ok()
                        .map(|g| ResolvedFilter::Grade(field, g)),
                    Match::Id => value
                        .parse::<Uuid>()
                        .ok()
                        .map(|id| ResolvedFilter::Id(field, id)),
                }
            })
            .collect()
    }

    /// Sorts from the query that are allowed for this entity, as (column, descending).
    /// Falls back to newest first.
    pub fn resolve_sorts(&self, query: &ListQuery) -> Vec<(&'static str, bool)> {
        let mut sorts: Vec<(&'static str, bool)> = self
            .sorts
            .iter()
            .filter_map(|field| {
                let direction = query.sorts.get(*field)?;
                Some((*field, direction.eq_ignore_ascii_case("desc")))
            })
            .collect();
        if sorts.is_empty() {
            sorts.push(("created_at", true));
        }
        sorts
    }
}

pub const USER_LIST: ListSpec = ListSpec {
    filters: &[("email", Match::Contains), ("name", Match::Contains)],
    sorts: &["created_at", "updated_at", "email", "name"],
};

pub const ROLE_LIST: ListSpec = ListSpec {
    filters: &[("name", Match::Contains), ("slug", Match::Exact)],
    sorts: &["created_at", "updated_at", "name", "slug"],
};

pub const PERMISSION_LIST: ListSpec = ROLE_LIST;

pub const CATEGORY_LIST: ListSpec = ROLE_LIST;

pub const QUESTION_LIST: ListSpec = ListSpec {
    filters: &[
        ("text", Match::Contains),
        ("grade", Match::Grade),
        ("category_id", Match::Id),
    ],
    sorts: &["created_at", "updated_at"],
};

/// Pagination block returned with every list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: u32,
    /// Page size actually applied
    pub page_count: u32,
    pub total: u64,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: u64) -> Self {
        Self {
            current_page: query.page,
            page_count: query.count,
            total,
        }
    }
}

/// Slug candidates taken by `slug` itself or a numbered duplicate `slug-N`.
pub fn is_slug_taken_by(candidate: &str, slug: &str) -> bool {
    if candidate == slug {
        return true;
    }
    candidate
        .strip_prefix(slug)
        .and_then(|rest| rest.strip_prefix('-'))
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<User>, Pagination)>;
    async fn create(&self, user: &User) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<User>;
    async fn get_by_email(&self, email: &str) -> Result<User>;
    async fn exists_by_email(&self, email: &str) -> Result<bool>;
    async fn update(&self, user: &User) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Pull a role reference out of every user holding it. Returns rows touched.
    async fn remove_role_from_all(&self, role_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Role>, Pagination)>;
    async fn create(&self, role: &Role) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Role>;
    /// Roles for the given ids; unknown ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Role>>;
    async fn update(&self, role: &Role) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Slugs in use that equal `slug` or are a numbered `slug-N` variant.
    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>>;
    async fn remove_permission_from_all(&self, permission_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Permission>, Pagination)>;
    async fn create(&self, permission: &Permission) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Permission>;
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Permission>>;
    async fn update(&self, permission: &Permission) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Slugs in use that equal `slug` or are a numbered `slug-N` variant.
    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Category>, Pagination)>;
    async fn create(&self, category: &Category) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Category>;
    async fn update(&self, category: &Category) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Slugs in use that equal `slug` or are a numbered `slug-N` variant.
    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Question>, Pagination)>;
    async fn create(&self, question: &Question) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Question>;
    async fn update(&self, question: &Question) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Up to `count` distinct questions matching category and grade, in random order.
    async fn sample(&self, category_id: Uuid, grade: Grade, count: usize) -> Result<Vec<Question>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store `token` as the user's only refresh token, superseding any prior one.
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<()>;
    async fn get_by_user_and_id(&self, user_id: Uuid, id: Uuid) -> Result<RefreshToken>;
    async fn delete_by_user(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The user's sessions, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<Session>, Pagination)>;
    /// Persist a session with its questions atomically.
    ///
    /// Fails with `UserHasActiveSession` when the owner already has an
    /// unfinished session; nothing is written in that case.
    async fn create_with_questions(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Session>;
    /// Move an unfinished session to finished. Fails with `SessionFinished`
    /// when another caller finished it first.
    async fn finish(
        &self,
        id: Uuid,
        summary: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<Session>;
    async fn exists_active(&self, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait SessionQuestionStore: Send + Sync {
    /// Questions of a session in draw order.
    async fn list(&self, session_id: Uuid) -> Result<Vec<SessionQuestion>>;
    /// Lookups are scoped by session: a question of another session is NotFound.
    async fn get_by_id(&self, session_id: Uuid, id: Uuid) -> Result<SessionQuestion>;
    async fn update(&self, question: &SessionQuestion) -> Result<()>;
}

/// Bundle of every store, handed to the service layer.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_questions: Arc<dyn SessionQuestionStore>,
}

impl Stores {
    pub(crate) fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore
            + RoleStore
            + PermissionStore
            + CategoryStore
            + QuestionStore
            + RefreshTokenStore
            + SessionStore
            + SessionQuestionStore
            + 'static,
    {
        Self {
            users: store.clone(),
            roles: store.clone(),
            permissions: store.clone(),
            categories: store.clone(),
            questions: store.clone(),
            refresh_tokens: store.clone(),
            sessions: store.clone(),
            session_questions: store,
        }
    }

    /// Stores backed by a fresh in-memory database.
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(memory::MemoryStore::new()))
    }

    /// Stores backed by Postgres.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_shared(Arc::new(postgres::PgStore::new(pool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_bounds() {
        let q = ListQuery::new(0, 5000).clamped(200);
        assert_eq!(q.page, 1);
        assert_eq!(q.count, 200);
        let q = ListQuery::new(3, 0).clamped(200);
        assert_eq!(q.count, 1);
        assert_eq!(q.offset(), 2);
    }

    #[test]
    fn test_unknown_filters_and_sorts_ignored() {
        let q = ListQuery::default()
            .filter("password_hash", "x")
            .filter("email", "Admin")
            .sort("password_hash", "asc");
        assert_eq!(
            USER_LIST.resolve_filters(&q),
            vec![ResolvedFilter::Contains("email", "admin".into())]
        );
        assert_eq!(USER_LIST.resolve_sorts(&q), vec![("created_at", true)]);
    }

    #[test]
    fn test_invalid_grade_filter_dropped() {
        let q = ListQuery::default().filter("grade", "lead");
        assert!(QUESTION_LIST.resolve_filters(&q).is_empty());
        let q = ListQuery::default().filter("grade", "senior");
        assert_eq!(
            QUESTION_LIST.resolve_filters(&q),
            vec![ResolvedFilter::Grade("grade", Grade::Senior)]
        );
    }

    #[test]
    fn test_slug_taken_by() {
        assert!(is_slug_taken_by("admin", "admin"));
        assert!(is_slug_taken_by("admin-2", "admin"));
        assert!(!is_slug_taken_by("admin-read", "admin"));
        assert!(!is_slug_taken_by("admin-", "admin"));
        assert!(!is_slug_taken_by("administrator", "admin"));
    }
}
