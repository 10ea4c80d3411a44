//! Question catalog handlers.

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
use crate::models::Question;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let gate = |slug: &'static str| {
        from_fn_with_state(PermissionGate::new(state.clone(), slug), require_permission)
    };

    Router::new()
        .route(
            "/",
            get(list_questions)
                .layer(gate("question-read"))
                .merge(post(create_question).layer(gate("question-create"))),
        )
        .route(
            "/:id",
            get(get_question)
                .layer(gate("question-read"))
                .merge(patch(update_question).layer(gate("question-update")))
                .merge(delete(delete_question).layer(gate("question-delete"))),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    pub category_id: Uuid,
    /// One of `junior`, `middle`, `senior`
    pub grade: String,
    pub text: String,
}

impl Validate for CreateQuestionRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("grade", &self.grade)?;
        require_non_empty("text", &self.text)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuestionRequest {
    pub grade: Option<String>,
    pub text: Option<String>,
}

impl Validate for UpdateQuestionRequest {
    fn validate(&self) -> Result<()> {
        if let Some(text) = &self.text {
            require_non_empty("text", text)?;
        }
        Ok(())
    }
}

/// List questions. Filterable by `category_id`, `grade` and `text`.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/questions",
    tag = "questions",
    responses((status = 200, description = "Page of questions", body = [Question])),
    security(("bearer_auth" = []))
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Question>>> {
    let page = state.services.questions.list(params.into_query()).await?;
    Ok(Json(ListResponse::new(page)))
}

/// Add a question to the catalog
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/questions",
    tag = "questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Unknown grade"),
        (status = 404, description = "Category not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_question(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<DataResponse<Question>>)> {
    let question = state
        .services
        .questions
        .create(body.category_id, &body.grade, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(question))))
}

/// Get a question
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/questions",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question", body = Question),
        (status = 404, description = "Question not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Question>>> {
    let question = state.services.questions.get_by_id(id).await?;
    Ok(Json(DataResponse::new(question)))
}

/// Edit a question
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/questions",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question id")),
    request_body = UpdateQuestionRequest,
    responses((status = 200, description = "Updated question", body = Question)),
    security(("bearer_auth" = []))
)]
pub async fn update_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateQuestionRequest>,
) -> Result<Json<DataResponse<Question>>> {
    let question = state
        .services
        .questions
        .update(id, body.grade.as_deref(), body.text.as_deref())
        .await?;
    Ok(Json(DataResponse::new(question)))
}

/// Delete a question
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/questions",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question id")),
    responses((status = 204, description = "Question deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.services.questions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_questions,
        create_question,
        get_question,
        update_question,
        delete_question
    ),
    components(schemas(Question, CreateQuestionRequest, UpdateQuestionRequest))
)]
pub struct QuestionsApiDoc;
