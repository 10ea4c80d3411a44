//! In-memory store.
//!
//! All tables live behind one `RwLock`, so every multi-record write is
//! applied under a single write guard and is all-or-nothing.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    is_slug_taken_by, CategoryStore, ListQuery, ListSpec, Pagination, PermissionStore,
    QuestionStore, RefreshTokenStore, ResolvedFilter, RoleStore, SessionQuestionStore,
    SessionStore, UserStore, CATEGORY_LIST, PERMISSION_LIST, QUESTION_LIST, ROLE_LIST, USER_LIST,
};
use crate::error::{AppError, Result};
use crate::models::{
    Category, Grade, Permission, Question, RefreshToken, Role, Session, SessionQuestion, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    categories: HashMap<Uuid, Category>,
    questions: HashMap<Uuid, Question>,
    /// Keyed by owning user: one token per user
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    sessions: HashMap<Uuid, Session>,
    session_questions: HashMap<Uuid, SessionQuestion>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn session_question_count(&self) -> usize {
        self.tables.read().await.session_questions.len()
    }
}

/// Field value exposed for filtering and sorting.
enum Field<'a> {
    Text(&'a str),
    Time(DateTime<Utc>),
    Grade(Grade),
    Id(Uuid),
}

trait Listable: Clone {
    fn id(&self) -> Uuid;
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

impl Listable for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "email" => Some(Field::Text(&self.email)),
            "name" => Some(Field::Text(&self.name)),
            "created_at" => Some(Field::Time(self.created_at)),
            "updated_at" => Some(Field::Time(self.updated_at)),
            _ => None,
        }
    }
}

macro_rules! named_slugged_listable {
    ($ty:ty) => {
        impl Listable for $ty {
            fn id(&self) -> Uuid {
                self.id
            }

            fn field(&self, name: &str) -> Option<Field<'_>> {
                match name {
                    "name" => Some(Field::Text(&self.name)),
                    "slug" => Some(Field::Text(&self.slug)),
                    "created_at" => Some(Field::Time(self.created_at)),
                    "updated_at" => Some(Field::Time(self.updated_at)),
                    _ => None,
                }
            }
        }
    };
}

named_slugged_listable!(Role);
named_slugged_listable!(Permission);
named_slugged_listable!(Category);

impl Listable for Question {
    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "text" => Some(Field::Text(&self.text)),
            "grade" => Some(Field::Grade(self.grade)),
            "category_id" => Some(Field::Id(self.category_id)),
            "created_at" => Some(Field::Time(self.created_at)),
            "updated_at" => Some(Field::Time(self.updated_at)),
            _ => None,
        }
    }
}

fn matches_filter<T: Listable>(record: &T, filter: &ResolvedFilter) -> bool {
    match filter {
        ResolvedFilter::Contains(name, needle) => match record.field(name) {
            Some(Field::Text(value)) => value.to_lowercase().contains(needle.as_str()),
            _ => false,
        },
        ResolvedFilter::Exact(name, expected) => {
            matches!(record.field(name), Some(Field::Text(value)) if value == expected.as_str())
        }
        ResolvedFilter::Grade(name, expected) => {
            matches!(record.field(name), Some(Field::Grade(value)) if value == *expected)
        }
        ResolvedFilter::Id(name, expected) => {
            matches!(record.field(name), Some(Field::Id(value)) if value == *expected)
        }
    }
}

fn compare_field(a: Option<Field<'_>>, b: Option<Field<'_>>) -> Ordering {
    match (a, b) {
        (Some(Field::Text(a)), Some(Field::Text(b))) => a.cmp(b),
        (Some(Field::Time(a)), Some(Field::Time(b))) => a.cmp(&b),
        (Some(Field::Grade(a)), Some(Field::Grade(b))) => a.as_str().cmp(b.as_str()),
        (Some(Field::Id(a)), Some(Field::Id(b))) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

/// Filter, sort and page a table the same way the SQL store does.
fn list_records<'a, T, I>(records: I, spec: &ListSpec, query: &ListQuery) -> (Vec<T>, Pagination)
where
    T: Listable + 'a,
    I: Iterator<Item = &'a T>,
{
    let filters = spec.resolve_filters(query);
    let sorts = spec.resolve_sorts(query);

    let mut rows: Vec<&T> = records
        .filter(|r| filters.iter().all(|f| matches_filter(*r, f)))
        .collect();

    rows.sort_by(|a, b| {
        sorts
            .iter()
            .map(|(name, desc)| {
                let ord = compare_field(a.field(name), b.field(name));
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| a.id().cmp(&b.id()))
    });

    let total = rows.len() as u64;
    let page = rows
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.count as usize)
        .cloned()
        .collect();
    (page, Pagination::new(query, total))
}

fn taken_slugs<'a>(slugs: impl Iterator<Item = &'a str>, slug: &str) -> Vec<String> {
    slugs
        .filter(|s| is_slug_taken_by(s, slug))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<User>, Pagination)> {
        let tables = self.tables.read().await;
        Ok(list_records(tables.users.values(), &USER_LIST, query))
    }

    async fn create(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::AlreadyExists("user".into()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.email == email))
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("user".into())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.remove(&id);
        tables
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    async fn remove_role_from_all(&self, role_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut touched = 0;
        for user in tables.users.values_mut() {
            if user.remove_role(role_id) {
                user.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Role>, Pagination)> {
        let tables = self.tables.read().await;
        Ok(list_records(tables.roles.values(), &ROLE_LIST, query))
    }

    async fn create(&self, role: &Role) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|r| r.slug == role.slug) {
            return Err(AppError::AlreadyExists("role".into()));
        }
        tables.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Role> {
        let tables = self.tables.read().await;
        tables
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("role".into()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.roles.get(id).cloned())
            .collect())
    }

    async fn update(&self, role: &Role) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("role".into())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .roles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("role".into()))
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(taken_slugs(tables.roles.values().map(|r| r.slug.as_str()), slug))
    }

    async fn remove_permission_from_all(&self, permission_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut touched = 0;
        for role in tables.roles.values_mut() {
            if role.remove_permission(permission_id) {
                role.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Permission>, Pagination)> {
        let tables = self.tables.read().await;
        Ok(list_records(tables.permissions.values(), &PERMISSION_LIST, query))
    }

    async fn create(&self, permission: &Permission) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.values().any(|p| p.slug == permission.slug) {
            return Err(AppError::AlreadyExists("permission".into()));
        }
        tables.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Permission> {
        let tables = self.tables.read().await;
        tables
            .permissions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("permission".into()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.permissions.get(id).cloned())
            .collect())
    }

    async fn update(&self, permission: &Permission) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .permissions
            .values()
            .any(|p| p.id != permission.id && p.slug == permission.slug)
        {
            return Err(AppError::AlreadyExists("permission".into()));
        }
        match tables.permissions.get_mut(&permission.id) {
            Some(existing) => {
                *existing = permission.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("permission".into())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .permissions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("permission".into()))
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(taken_slugs(
            tables.permissions.values().map(|p| p.slug.as_str()),
            slug,
        ))
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Category>, Pagination)> {
        let tables = self.tables.read().await;
        Ok(list_records(tables.categories.values(), &CATEGORY_LIST, query))
    }

    async fn create(&self, category: &Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.slug == category.slug) {
            return Err(AppError::AlreadyExists("category".into()));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Category> {
        let tables = self.tables.read().await;
        tables
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("category".into()))
    }

    async fn update(&self, category: &Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("category".into())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("category".into()))
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(taken_slugs(
            tables.categories.values().map(|c| c.slug.as_str()),
            slug,
        ))
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Question>, Pagination)> {
        let tables = self.tables.read().await;
        Ok(list_records(tables.questions.values(), &QUESTION_LIST, query))
    }

    async fn create(&self, question: &Question) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.questions.insert(question.id, question.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Question> {
        let tables = self.tables.read().await;
        tables
            .questions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("question".into()))
    }

    async fn update(&self, question: &Question) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.questions.get_mut(&question.id) {
            Some(existing) => {
                *existing = question.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("question".into())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .questions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("question".into()))
    }

    async fn sample(&self, category_id: Uuid, grade: Grade, count: usize) -> Result<Vec<Question>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.category_id == category_id && q.grade == grade)
            .cloned()
            .collect();
        drop(tables);

        candidates.shuffle(&mut rand::rng());
        candidates.truncate(count);
        Ok(candidates)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.insert(token.user_id, token.clone());
        Ok(())
    }

    async fn get_by_user_and_id(&self, user_id: Uuid, id: Uuid) -> Result<RefreshToken> {
        let tables = self.tables.read().await;
        tables
            .refresh_tokens
            .get(&user_id)
            .filter(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("refresh token".into()))
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<Session>, Pagination)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Session> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.count as usize)
            .cloned()
            .collect();
        Ok((page, Pagination::new(query, total)))
    }

    async fn create_with_questions(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .sessions
            .values()
            .any(|s| s.user_id == session.user_id && !s.is_finished())
        {
            return Err(AppError::UserHasActiveSession);
        }
        tables.sessions.insert(session.id, session.clone());
        for question in questions {
            tables
                .session_questions
                .insert(question.id, question.clone());
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Session> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("session".into()))
    }

    async fn finish(
        &self,
        id: Uuid,
        summary: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<Session> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("session".into()))?;
        if session.is_finished() {
            return Err(AppError::SessionFinished);
        }
        if let Some(summary) = summary {
            session.summary = summary.to_string();
        }
        session.finished_at = Some(finished_at);
        Ok(session.clone())
    }

    async fn exists_active(&self, user_id: Uuid) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .any(|s| s.user_id == user_id && !s.is_finished()))
    }
}

#[async_trait]
impl SessionQuestionStore for MemoryStore {
    async fn list(&self, session_id: Uuid) -> Result<Vec<SessionQuestion>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<SessionQuestion> = tables
            .session_questions
            .values()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|q| q.position);
        Ok(rows)
    }

    async fn get_by_id(&self, session_id: Uuid, id: Uuid) -> Result<SessionQuestion> {
        let tables = self.tables.read().await;
        tables
            .session_questions
            .get(&id)
            .filter(|q| q.session_id == session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("session question".into()))
    }

    async fn update(&self, question: &SessionQuestion) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.session_questions.get_mut(&question.id) {
            Some(existing) if existing.session_id == question.session_id => {
                *existing = question.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound("session question".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn role(name: &str, slug: &str, age_secs: i64) -> Role {
        let at = Utc::now() - Duration::seconds(age_secs);
        Role {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            permission_ids: vec![],
            created_at: at,
            updated_at: at,
        }
    }

    fn session(user_id: Uuid) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id,
            category_id: Uuid::new_v4(),
            grade: Grade::Junior,
            summary: String::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    fn session_question(session_id: Uuid, position: i32) -> SessionQuestion {
        SessionQuestion {
            id: Uuid::new_v4(),
            session_id,
            position,
            text: format!("q{position}"),
            answer: String::new(),
            summary: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        RoleStore::create(&store, &role("Admin", "admin", 30)).await.unwrap();
        RoleStore::create(&store, &role("Editor", "editor", 20)).await.unwrap();
        RoleStore::create(&store, &role("Admin Lite", "admin-lite", 10)).await.unwrap();

        let query = ListQuery::new(1, 10).filter("name", "ADMIN").sort("name", "asc");
        let (rows, pagination) = RoleStore::list(&store, &query).await.unwrap();
        assert_eq!(pagination.total, 2);
        assert_eq!(rows[0].slug, "admin");
        assert_eq!(rows[1].slug, "admin-lite");

        let (rows, pagination) = RoleStore::list(&store, &ListQuery::new(2, 2)).await.unwrap();
        assert_eq!(pagination.total, 3);
        assert_eq!(pagination.current_page, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "admin");
    }

    #[tokio::test]
    async fn test_taken_slugs_include_numbered_duplicates() {
        let store = MemoryStore::new();
        RoleStore::create(&store, &role("Admin", "admin", 0)).await.unwrap();
        RoleStore::create(&store, &role("Admin", "admin-3", 0)).await.unwrap();
        RoleStore::create(&store, &role("Admin read", "admin-read", 0)).await.unwrap();
        let mut taken = RoleStore::taken_slugs(&store, "admin").await.unwrap();
        taken.sort();
        assert_eq!(taken, ["admin", "admin-3"]);
        assert!(RoleStore::taken_slugs(&store, "editor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_active_session_rejected_atomically() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let first = session(user_id);
        store
            .create_with_questions(&first, &[session_question(first.id, 0)])
            .await
            .unwrap();

        let second = session(user_id);
        let err = store
            .create_with_questions(&second, &[session_question(second.id, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserHasActiveSession));
        assert!(SessionQuestionStore::list(&store, second.id).await.unwrap().is_empty());
        assert!(SessionStore::get_by_id(&store, second.id).await.is_err());
    }

    #[tokio::test]
    async fn test_finish_is_compare_and_swap() {
        let store = MemoryStore::new();
        let s = session(Uuid::new_v4());
        store.create_with_questions(&s, &[]).await.unwrap();

        let finished = store.finish(s.id, Some("done"), Utc::now()).await.unwrap();
        assert_eq!(finished.summary, "done");
        assert!(!store.exists_active(s.user_id).await.unwrap());

        let err = store.finish(s.id, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFinished));
    }

    #[tokio::test]
    async fn test_session_question_lookup_is_session_scoped() {
        let store = MemoryStore::new();
        let s = session(Uuid::new_v4());
        let q = session_question(s.id, 0);
        store.create_with_questions(&s, &[q.clone()]).await.unwrap();

        assert!(SessionQuestionStore::get_by_id(&store, s.id, q.id).await.is_ok());
        let err = SessionQuestionStore::get_by_id(&store, Uuid::new_v4(), q.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_replace_for_user_keeps_single_token() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let token = |id| RefreshToken {
            id,
            user_id,
            ip: "127.0.0.1".into(),
            token_hash: "h".into(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        store.replace_for_user(&token(old)).await.unwrap();
        store.replace_for_user(&token(new)).await.unwrap();

        assert!(store.get_by_user_and_id(user_id, old).await.is_err());
        assert!(store.get_by_user_and_id(user_id, new).await.is_ok());
    }
}
