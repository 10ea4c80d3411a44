//! Answers to the questions drawn into a session.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{SessionQuestion, User};
use crate::services::session_service::SessionService;
use crate::services::summarizer::Summarizer;
use crate::store::{SessionQuestionStore, Stores};

/// Every operation first fetches the session through the owner-checked
/// getter, so questions of foreign or finished sessions are unreachable.
pub struct SessionQuestionService {
    sessions: Arc<SessionService>,
    questions: Arc<dyn SessionQuestionStore>,
    summarizer: Arc<dyn Summarizer>,
}

impl SessionQuestionService {
    pub fn new(
        stores: &Stores,
        sessions: Arc<SessionService>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            sessions,
            questions: stores.session_questions.clone(),
            summarizer,
        }
    }

    pub async fn list(&self, user: &User, session_id: Uuid) -> Result<Vec<SessionQuestion>> {
        let session = self.sessions.get_by_id(user, session_id).await?;
        self.questions.list(session.id).await
    }

    pub async fn get_by_id(
        &self,
        user: &User,
        session_id: Uuid,
        id: Uuid,
    ) -> Result<SessionQuestion> {
        let session = self.sessions.get_by_id(user, session_id).await?;
        self.questions.get_by_id(session.id, id).await
    }

    /// Record an answer. Answering again overwrites the previous answer and
    /// its summary while the session is still active.
    #[instrument(skip(self, user, answer), fields(user_id = %user.id))]
    pub async fn answer(
        &self,
        user: &User,
        session_id: Uuid,
        id: Uuid,
        answer: &str,
    ) -> Result<SessionQuestion> {
        let mut question = self.get_by_id(user, session_id, id).await?;
        question.answer = answer.to_string();
        question.summary = self.summarizer.summarize_answer(&question).await;
        question.updated_at = Utc::now();
        self.questions.update(&question).await?;
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::Session;
    use crate::services::test_support::{harness, seed_questions, test_user, Harness};

    async fn started(h: &Harness) -> (User, Session) {
        let user = test_user(h, "answer@test.com").await;
        let category = h.services.categories.create("Go", "").await.unwrap();
        seed_questions(h, category.id, "senior", 10).await;
        let session = h
            .services
            .sessions
            .create(&user, category.id, "senior")
            .await
            .unwrap();
        (user, session)
    }

    #[tokio::test]
    async fn test_answer_can_be_overwritten_until_finished() {
        let h = harness();
        let (user, session) = started(&h).await;
        let questions = h.services.session_questions.list(&user, session.id).await.unwrap();
        let target = questions[3].id;

        let first = h
            .services
            .session_questions
            .answer(&user, session.id, target, "first try")
            .await
            .unwrap();
        assert_eq!(first.answer, "first try");
        assert!(!first.summary.is_empty());

        let second = h
            .services
            .session_questions
            .answer(&user, session.id, target, "second try")
            .await
            .unwrap();
        assert_eq!(second.answer, "second try");

        h.services.sessions.summarize(&user, session.id).await.unwrap();
        let err = h
            .services
            .session_questions
            .answer(&user, session.id, target, "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionFinished));
    }

    #[tokio::test]
    async fn test_questions_are_listed_in_draw_order() {
        let h = harness();
        let (user, session) = started(&h).await;
        let questions = h.services.session_questions.list(&user, session.id).await.unwrap();
        let positions: Vec<i32> = questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cross_session_lookup_is_not_found() {
        let h = harness();
        let (user, session) = started(&h).await;
        let question = h.services.session_questions.list(&user, session.id).await.unwrap()[0].clone();
        h.services.sessions.cancel(&user, session.id).await.unwrap();

        let category = h.services.categories.create("Rust", "").await.unwrap();
        seed_questions(&h, category.id, "senior", 10).await;
        let other = h
            .services
            .sessions
            .create(&user, category.id, "senior")
            .await
            .unwrap();

        let err = h
            .services
            .session_questions
            .get_by_id(&user, other.id, question.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_foreign_session_questions_denied() {
        let h = harness();
        let (_, session) = started(&h).await;
        let intruder = test_user(&h, "intruder@test.com").await;
        let err = h
            .services
            .session_questions
            .list(&intruder, session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied));
    }
}
