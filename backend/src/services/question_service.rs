//! Question catalog.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Grade, Question};
use crate::store::{CategoryStore, ListQuery, Pagination, QuestionStore, Stores};

pub struct QuestionService {
    questions: Arc<dyn QuestionStore>,
    categories: Arc<dyn CategoryStore>,
    config: Arc<Config>,
}

impl QuestionService {
    pub fn new(stores: &Stores, config: Arc<Config>) -> Self {
        Self {
            questions: stores.questions.clone(),
            categories: stores.categories.clone(),
            config,
        }
    }

    pub async fn list(&self, query: ListQuery) -> Result<(Vec<Question>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.questions.list(&query).await
    }

    /// Add a question to a category. Fails with `InvalidGradeValue` for an
    /// unknown grade and `NotFound` for an unknown category.
    #[instrument(skip(self, text))]
    pub async fn create(&self, category_id: Uuid, grade: &str, text: &str) -> Result<Question> {
        let grade: Grade = grade.parse()?;
        self.categories.get_by_id(category_id).await?;

        let now = Utc::now();
        let question = Question {
            id: Uuid::new_v4(),
            category_id,
            grade,
            text: text.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.questions.create(&question).await?;
        Ok(question)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Question> {
        self.questions.get_by_id(id).await
    }

    /// Edit a catalog question. Sessions that already drew it keep their copy.
    #[instrument(skip(self, text))]
    pub async fn update(&self, id: Uuid, grade: Option<&str>, text: Option<&str>) -> Result<Question> {
        let grade = grade.map(str::parse::<Grade>).transpose()?;
        let mut question = self.questions.get_by_id(id).await?;
        if let Some(grade) = grade {
            question.grade = grade;
        }
        if let Some(text) = text {
            question.text = text.to_string();
        }
        question.updated_at = Utc::now();
        self.questions.update(&question).await?;
        Ok(question)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.questions.delete(id).await
    }

    /// Up to `count` random questions for a category and grade.
    pub async fn draw(&self, category_id: Uuid, grade: Grade, count: usize) -> Result<Vec<Question>> {
        self.questions.sample(category_id, grade, count).await
    }
}
