//! Question categories.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Category;
use crate::services::slug::{dedupe, slugify};
use crate::store::{CategoryStore, ListQuery, Pagination, Stores};

pub struct CategoryService {
    categories: Arc<dyn CategoryStore>,
    config: Arc<Config>,
}

impl CategoryService {
    pub fn new(stores: &Stores, config: Arc<Config>) -> Self {
        Self {
            categories: stores.categories.clone(),
            config,
        }
    }

    pub async fn list(&self, query: ListQuery) -> Result<(Vec<Category>, Pagination)> {
        let query = query.clamped(self.config.list_max_count);
        self.categories.list(&query).await
    }

    #[instrument(skip(self, description))]
    pub async fn create(&self, name: &str, description: &str) -> Result<Category> {
        let base = slugify(name);
        if base.is_empty() {
            return Err(AppError::Validation("name must contain letters or digits".into()));
        }
        let taken = self.categories.taken_slugs(&base).await?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: dedupe(base, &taken),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.categories.create(&category).await?;
        Ok(category)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Category> {
        self.categories.get_by_id(id).await
    }

    #[instrument(skip(self, description))]
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Category> {
        let mut category = self.categories.get_by_id(id).await?;
        if let Some(name) = name {
            category.name = name.to_string();
        }
        if let Some(description) = description {
            category.description = description.to_string();
        }
        category.updated_at = Utc::now();
        self.categories.update(&category).await?;
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.categories.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::services::test_support::harness;
    use crate::store::ListQuery;

    #[tokio::test]
    async fn test_create_and_filter_by_slug() {
        let h = harness();
        h.services.categories.create("Go", "Go language").await.unwrap();
        h.services.categories.create("SQL", "Databases").await.unwrap();

        let (rows, pagination) = h
            .services
            .categories
            .list(ListQuery::new(1, 10).filter("slug", "sql"))
            .await
            .unwrap();
        assert_eq!(pagination.total, 1);
        assert_eq!(rows[0].name, "SQL");
    }

    #[tokio::test]
    async fn test_list_count_is_capped() {
        let h = harness();
        let (_, pagination) = h
            .services
            .categories
            .list(ListQuery::new(1, 10_000))
            .await
            .unwrap();
        assert_eq!(pagination.page_count, 200);
    }

    #[tokio::test]
    async fn test_deleted_slug_suffix_is_reused() {
        let h = harness();
        let categories = &h.services.categories;
        categories.create("Go", "").await.unwrap();
        let second = categories.create("Go", "").await.unwrap();
        categories.create("Go", "").await.unwrap();
        categories.delete(second.id).await.unwrap();

        let again = categories.create("Go", "").await.unwrap();
        assert_eq!(again.slug, "go-2");
    }
}
