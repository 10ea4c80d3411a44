//! Postgres store built on runtime-checked sqlx queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    CategoryStore, ListQuery, ListSpec, Pagination, PermissionStore, QuestionStore,
    RefreshTokenStore, ResolvedFilter, RoleStore, SessionQuestionStore, SessionStore, UserStore,
    CATEGORY_LIST, PERMISSION_LIST, QUESTION_LIST, ROLE_LIST, USER_LIST,
};
use crate::error::{AppError, Result};
use crate::models::{
    Category, Grade, Permission, Question, RefreshToken, Role, Session, SessionQuestion, User,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove every row from every table. Used by the fixture loader.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query(
            "TRUNCATE session_questions, sessions, refresh_tokens, questions, categories, \
             roles, permissions, users",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_table<T>(
        &self,
        table: &'static str,
        spec: &ListSpec,
        query: &ListQuery,
    ) -> Result<(Vec<T>, Pagination)>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let filters = spec.resolve_filters(query);

        let mut count_qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {table}"));
        push_filters(&mut count_qb, &filters);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {table}"));
        push_filters(&mut qb, &filters);
        qb.push(" ORDER BY ");
        for (column, desc) in spec.resolve_sorts(query) {
            qb.push(column).push(if desc { " DESC, " } else { " ASC, " });
        }
        qb.push("id ASC LIMIT ")
            .push_bind(i64::from(query.count))
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows = qb.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok((rows, Pagination::new(query, total.max(0) as u64)))
    }

    async fn slugs_in(&self, table: &'static str, slug: &str) -> Result<Vec<String>> {
        let slugs: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT slug FROM {table} WHERE slug = $1 OR slug ~ ('^' || $1 || '-[0-9]+$')"
        ))
        .bind(slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(slugs)
    }

    async fn delete_by_id(&self, table: &'static str, what: &str, id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(what.to_string()));
        }
        Ok(())
    }
}

/// Column names come from the static whitelist; values are always bound.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &[ResolvedFilter]) {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            ResolvedFilter::Contains(column, value) => {
                qb.push(*column)
                    .push(" ILIKE ")
                    .push_bind(format!("%{}%", escape_like(value)));
            }
            ResolvedFilter::Exact(column, value) => {
                qb.push(*column).push(" = ").push_bind(value.clone());
            }
            ResolvedFilter::Grade(column, grade) => {
                qb.push(*column).push(" = ").push_bind(*grade);
            }
            ResolvedFilter::Id(column, id) => {
                qb.push(*column).push(" = ").push_bind(*id);
            }
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn affected_or_not_found(rows: u64, what: &str) -> Result<()> {
    if rows == 0 {
        Err(AppError::NotFound(what.to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<User>, Pagination)> {
        self.list_table("users", &USER_LIST, query).await
    }

    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, avatar, password_hash, role_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .bind(&user.role_ids)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, name = $3, avatar = $4, password_hash = $5, role_ids = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .bind(&user.role_ids)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "user")
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("users", "user", id).await
    }

    async fn remove_role_from_all(&self, role_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE users SET role_ids = array_remove(role_ids, $1), updated_at = NOW() \
             WHERE $1 = ANY(role_ids)",
        )
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Role>, Pagination)> {
        self.list_table("roles", &ROLE_LIST, query).await
    }

    async fn create(&self, role: &Role) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, slug, permission_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.slug)
        .bind(&role.permission_ids)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Role> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("role".into()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn update(&self, role: &Role) -> Result<()> {
        let result = sqlx::query(
            "UPDATE roles SET name = $2, slug = $3, permission_ids = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.slug)
        .bind(&role.permission_ids)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "role")
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("roles", "role", id).await
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        self.slugs_in("roles", slug).await
    }

    async fn remove_permission_from_all(&self, permission_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE roles SET permission_ids = array_remove(permission_ids, $1), updated_at = NOW() \
             WHERE $1 = ANY(permission_ids)",
        )
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Permission>, Pagination)> {
        self.list_table("permissions", &PERMISSION_LIST, query).await
    }

    async fn create(&self, permission: &Permission) -> Result<()> {
        sqlx::query(
            "INSERT INTO permissions (id, name, slug, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(permission.id)
        .bind(&permission.name)
        .bind(&permission.slug)
        .bind(permission.created_at)
        .bind(permission.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Permission> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("permission".into()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Permission>> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = ANY($1)")
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        Ok(permissions)
    }

    async fn update(&self, permission: &Permission) -> Result<()> {
        let result = sqlx::query(
            "UPDATE permissions SET name = $2, slug = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(permission.id)
        .bind(&permission.name)
        .bind(&permission.slug)
        .bind(permission.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "permission")
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("permissions", "permission", id).await
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        self.slugs_in("permissions", slug).await
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Category>, Pagination)> {
        self.list_table("categories", &CATEGORY_LIST, query).await
    }

    async fn create(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("category".into()))
    }

    async fn update(&self, category: &Category) -> Result<()> {
        let result = sqlx::query(
            "UPDATE categories SET name = $2, description = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "category")
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("categories", "category", id).await
    }

    async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
        self.slugs_in("categories", slug).await
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Question>, Pagination)> {
        self.list_table("questions", &QUESTION_LIST, query).await
    }

    async fn create(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, category_id, grade, text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(question.id)
        .bind(question.category_id)
        .bind(question.grade)
        .bind(&question.text)
        .bind(question.created_at)
        .bind(question.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Question> {
        sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("question".into()))
    }

    async fn update(&self, question: &Question) -> Result<()> {
        let result = sqlx::query(
            "UPDATE questions SET grade = $2, text = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(question.id)
        .bind(question.grade)
        .bind(&question.text)
        .bind(question.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "question")
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("questions", "question", id).await
    }

    async fn sample(&self, category_id: Uuid, grade: Grade, count: usize) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE category_id = $1 AND grade = $2
            ORDER BY random()
            LIMIT $3
            "#,
        )
        .bind(category_id)
        .bind(grade)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn replace_for_user(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, ip, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                id = EXCLUDED.id,
                ip = EXCLUDED.ip,
                token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.ip)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_user_and_id(&self, user_id: Uuid, id: Uuid) -> Result<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("refresh token".into()))
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<Session>, Pagination)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1
            ORDER BY created_at DESC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(query.count))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((sessions, Pagination::new(query, total.max(0) as u64)))
    }

    async fn create_with_questions(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The partial unique index rejects a second unfinished session here.
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, category_id, grade, summary, created_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.category_id)
        .bind(session.grade)
        .bind(&session.summary)
        .bind(session.created_at)
        .bind(session.finished_at)
        .execute(&mut *tx)
        .await?;

        if !questions.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO session_questions \
                 (id, session_id, position, text, answer, summary, created_at, updated_at) ",
            );
            qb.push_values(questions, |mut row, q| {
                row.push_bind(q.id)
                    .push_bind(q.session_id)
                    .push_bind(q.position)
                    .push_bind(q.text.clone())
                    .push_bind(q.answer.clone())
                    .push_bind(q.summary.clone())
                    .push_bind(q.created_at)
                    .push_bind(q.updated_at);
            });
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Session> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("session".into()))
    }

    async fn finish(
        &self,
        id: Uuid,
        summary: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<Session> {
        let finished = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET summary = COALESCE($2, summary), finished_at = $3
            WHERE id = $1 AND finished_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(summary)
        .bind(finished_at)
        .fetch_optional(&self.pool)
        .await?;

        match finished {
            Some(session) => Ok(session),
            None => {
                // Either the row is gone or another caller finished it first.
                SessionStore::get_by_id(self, id).await?;
                Err(AppError::SessionFinished)
            }
        }
    }

    async fn exists_active(&self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE user_id = $1 AND finished_at IS NULL)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl SessionQuestionStore for PgStore {
    async fn list(&self, session_id: Uuid) -> Result<Vec<SessionQuestion>> {
        let questions = sqlx::query_as::<_, SessionQuestion>(
            "SELECT * FROM session_questions WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn get_by_id(&self, session_id: Uuid, id: Uuid) -> Result<SessionQuestion> {
        sqlx::query_as::<_, SessionQuestion>(
            "SELECT * FROM session_questions WHERE session_id = $1 AND id = $2",
        )
        .bind(session_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("session question".into()))
    }

    async fn update(&self, question: &SessionQuestion) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE session_questions
            SET answer = $3, summary = $4, updated_at = $5
            WHERE id = $1 AND session_id = $2
            "#,
        )
        .bind(question.id)
        .bind(question.session_id)
        .bind(&question.answer)
        .bind(&question.summary)
        .bind(question.updated_at)
        .execute(&self.pool)
        .await?;
        affected_or_not_found(result.rows_affected(), "session question")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_filters_render_whitelisted_columns() {
        let query = ListQuery::default()
            .filter("name", "adm")
            .filter("slug", "admin")
            .filter("drop table", "x");
        let filters = ROLE_LIST.resolve_filters(&query);
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM roles");
        push_filters(&mut qb, &filters);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM roles WHERE name ILIKE $1 AND slug = $2"
        );
    }
}
