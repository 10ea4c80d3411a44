//! Session engine.
//!
//! A session is `active` until its finish time is set, then `finished` for
//! good. A user holds at most one active session; the store enforces this
//! when the session is inserted, so concurrent creates cannot both win.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Grade, Session, SessionQuestion, User};
use crate::services::summarizer::Summarizer;
use crate::store::{CategoryStore, ListQuery, Pagination, QuestionStore, SessionStore, Stores};

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    categories: Arc<dyn CategoryStore>,
    questions: Arc<dyn QuestionStore>,
    summarizer: Arc<dyn Summarizer>,
    config: Arc<Config>,
}

impl SessionService {
    pub fn new(stores: &Stores, summarizer: Arc<dyn Summarizer>, config: Arc<Config>) -> Self {
        Self {
            sessions: stores.sessions.clone(),
            categories: stores.categories.clone(),
            questions: stores.questions.clone(),
            summarizer,
            config,
        }
    }

    /// The user's own sessions, newest first, finished ones included.
    pub async fn list(&self, user: &User, query: ListQuery) -> Result<(Vec<Session>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.sessions.list_for_user(user.id, &query).await
    }

    /// Start a session with a fresh random batch of questions.
    ///
    /// The batch is all-or-nothing: when fewer questions than the batch size
    /// match, nothing is written and `QuestionNotEnough` is returned.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User, category_id: Uuid, grade: &str) -> Result<Session> {
        if self.sessions.exists_active(user.id).await? {
            return Err(AppError::UserHasActiveSession);
        }

        self.categories.get_by_id(category_id).await?;
        let grade: Grade = grade.parse()?;

        let batch = self.config.session_question_count;
        let drawn = self.questions.sample(category_id, grade, batch).await?;
        if drawn.len() < batch {
            tracing::debug!(available = drawn.len(), batch, "Not enough questions to draw");
            return Err(AppError::QuestionNotEnough);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            category_id,
            grade,
            summary: String::new(),
            created_at: now,
            finished_at: None,
        };
        let questions: Vec<SessionQuestion> = drawn
            .into_iter()
            .enumerate()
            .map(|(position, question)| SessionQuestion {
                id: Uuid::new_v4(),
                session_id: session.id,
                position: position as i32,
                text: question.text,
                answer: String::new(),
                summary: String::new(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        // A concurrent create that slipped past the check above fails here.
        self.sessions
            .create_with_questions(&session, &questions)
            .await?;

        tracing::info!(session_id = %session.id, questions = questions.len(), "Session started");
        Ok(session)
    }

    /// Fetch a session the user owns and has not finished yet.
    ///
    /// Ownership is checked first, so a non-owner never learns whether the
    /// session is finished.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn get_by_id(&self, user: &User, id: Uuid) -> Result<Session> {
        let session = self.sessions.get_by_id(id).await?;
        if session.user_id != user.id {
            return Err(AppError::AccessDenied);
        }
        if session.is_finished() {
            return Err(AppError::SessionFinished);
        }
        Ok(session)
    }

    /// Finish a session with a written summary.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn summarize(&self, user: &User, id: Uuid) -> Result<Session> {
        let session = self.get_by_id(user, id).await?;
        let summary = self.summarizer.summarize_session(&session).await;
        let session = self
            .sessions
            .finish(session.id, Some(&summary), Utc::now())
            .await?;
        tracing::info!(session_id = %session.id, "Session summarized");
        Ok(session)
    }

    /// Finish a session without a summary.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn cancel(&self, user: &User, id: Uuid) -> Result<Session> {
        let session = self.get_by_id(user, id).await?;
        let session = self.sessions.finish(session.id, None, Utc::now()).await?;
        tracing::info!(session_id = %session.id, "Session cancelled");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use crate::services::summarizer::PENDING_SUMMARY;
    use crate::services::test_support::{harness, seed_questions, test_user, Harness};
    use std::collections::HashSet;

    async fn setup(h: &Harness, count: usize) -> (User, Uuid) {
        let user = test_user(h, "subject@test.com").await;
        let category = h.services.categories.create("SQL", "").await.unwrap();
        seed_questions(h, category.id, "junior", count).await;
        (user, category.id)
    }

    #[tokio::test]
    async fn test_create_draws_full_batch_verbatim() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;

        let session = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(session.summary.is_empty());

        let drawn = h.stores.session_questions.list(session.id).await.unwrap();
        assert_eq!(drawn.len(), 10);
        let texts: HashSet<_> = drawn.iter().map(|q| q.text.clone()).collect();
        let expected: HashSet<_> = (0..10).map(|i| format!("junior question {i}")).collect();
        assert_eq!(texts, expected);
        assert!(drawn.iter().all(|q| q.answer.is_empty()));

        let err = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserHasActiveSession));
    }

    #[tokio::test]
    async fn test_short_catalog_writes_nothing() {
        let h = harness();
        let (user, category_id) = setup(&h, 9).await;

        let err = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuestionNotEnough));
        assert!(!h.stores.sessions.exists_active(user.id).await.unwrap());
        let (sessions, _) = h
            .services
            .sessions
            .list(&user, ListQuery::default())
            .await
            .unwrap();
        assert!(sessions.is_empty());
        assert_eq!(h.memory.session_question_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_validates_category_then_grade() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;

        let err = h
            .services
            .sessions
            .create(&user, Uuid::new_v4(), "lead")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = h
            .services
            .sessions
            .create(&user, category_id, "lead")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidGradeValue));
    }

    #[tokio::test]
    async fn test_concurrent_creates_leave_one_active_session() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;
        let service = h.services.sessions.clone();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let user = user.clone();
                tokio::spawn(async move { service.create(&user, category_id, "junior").await })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::UserHasActiveSession) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);

        let (sessions, _) = service.list(&user, ListQuery::default()).await.unwrap();
        assert_eq!(sessions.iter().filter(|s| !s.is_finished()).count(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id_checks_owner_before_state() {
        let h = harness();
        let (owner, category_id) = setup(&h, 10).await;
        let other = test_user(&h, "other@test.com").await;
        let session = h
            .services
            .sessions
            .create(&owner, category_id, "junior")
            .await
            .unwrap();

        let err = h.services.sessions.get_by_id(&other, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::AccessDenied));

        h.services.sessions.cancel(&owner, session.id).await.unwrap();
        let err = h.services.sessions.get_by_id(&other, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::AccessDenied));
        let err = h.services.sessions.get_by_id(&owner, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFinished));
    }

    #[tokio::test]
    async fn test_summarize_finishes_once() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;
        let session = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap();

        let finished = h.services.sessions.summarize(&user, session.id).await.unwrap();
        assert_eq!(finished.status(), SessionStatus::Finished);
        assert_eq!(finished.summary, PENDING_SUMMARY);

        let err = h.services.sessions.summarize(&user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFinished));
        let err = h.services.sessions.cancel(&user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFinished));
    }

    #[tokio::test]
    async fn test_cancel_leaves_summary_empty_and_frees_slot() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;
        let first = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap();

        let cancelled = h.services.sessions.cancel(&user, first.id).await.unwrap();
        assert!(cancelled.finished_at.is_some());
        assert!(cancelled.summary.is_empty());

        let second = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap();
        let (sessions, pagination) = h
            .services
            .sessions
            .list(&user, ListQuery::default())
            .await
            .unwrap();
        assert_eq!(pagination.total, 2);
        assert!(sessions.iter().any(|s| s.id == second.id));
        assert!(sessions.iter().any(|s| s.id == first.id && s.is_finished()));
    }

    #[tokio::test]
    async fn test_catalog_edits_do_not_touch_drawn_questions() {
        let h = harness();
        let (user, category_id) = setup(&h, 10).await;
        let session = h
            .services
            .sessions
            .create(&user, category_id, "junior")
            .await
            .unwrap();

        let (catalog, _) = h
            .services
            .questions
            .list(ListQuery::new(1, 50))
            .await
            .unwrap();
        for question in catalog {
            h.services
                .questions
                .update(question.id, None, Some("rewritten"))
                .await
                .unwrap();
        }

        let drawn = h.stores.session_questions.list(session.id).await.unwrap();
        assert!(drawn.iter().all(|q| q.text != "rewritten"));
    }
}
