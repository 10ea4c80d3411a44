//! Category handlers. Reading needs only a login; writing needs `category-*`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{require_non_empty, DataResponse, ListParams, ListResponse, Validate};
use crate::api::extract::JsonBody;
use crate::api::middleware::auth::{require_permission, PermissionGate};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::Category;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let gate = |slug: &'static str| {
        from_fn_with_state(PermissionGate::new(state.clone(), slug), require_permission)
    };

    Router::new()
        .route(
            "/",
            get(list_categories).merge(post(create_category).layer(gate("category-create"))),
        )
        .route(
            "/:id",
            get(get_category)
                .merge(patch(update_category).layer(gate("category-update")))
                .merge(delete(delete_category).layer(gate("category-delete"))),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateCategoryRequest {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }
}

/// List categories
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/categories",
    tag = "categories",
    responses((status = 200, description = "Page of categories", body = [Category])),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Category>>> {
    let page = state.services.categories.list(params.into_query()).await?;
    Ok(Json(ListResponse::new(page)))
}

/// Create a category
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses((status = 201, description = "Category created", body = Category)),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<DataResponse<Category>>)> {
    let category = state
        .services
        .categories
        .create(&body.name, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(category))))
}

/// Get a category
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/categories",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Category>>> {
    let category = state.services.categories.get_by_id(id).await?;
    Ok(Json(DataResponse::new(category)))
}

/// Update a category
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/categories",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses((status = 200, description = "Updated category", body = Category)),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateCategoryRequest>,
) -> Result<Json<DataResponse<Category>>> {
    let category = state
        .services
        .categories
        .update(id, body.name.as_deref(), body.description.as_deref())
        .await?;
    Ok(Json(DataResponse::new(category)))
}

/// Delete a category
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/categories",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses((status = 204, description = "Category deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.services.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_categories,
        create_category,
        get_category,
        update_category,
        delete_category
    ),
    components(schemas(Category, CreateCategoryRequest, UpdateCategoryRequest))
)]
pub struct CategoriesApiDoc;
