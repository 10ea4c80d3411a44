//! Questions of a session and their answers.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{require_non_empty, DataResponse, Validate};
use crate::api::extract::JsonBody;
use crate::api::middleware::auth::AuthUser;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::SessionQuestion;

/// Mounted under `/sessions`, next to the session routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/:id/questions", get(list_questions))
        .route(
            "/:id/questions/:question_id",
            get(get_question).patch(answer_question),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub answer: String,
}

impl Validate for AnswerRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("answer", &self.answer)
    }
}

/// Questions drawn into a session, in draw order
#[utoipa::path(
    get,
    path = "/{id}/questions",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Session questions", body = [SessionQuestion])),
    security(("bearer_auth" = []))
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DataResponse<Vec<SessionQuestion>>>> {
    let questions = state
        .services
        .session_questions
        .list(&auth.user, session_id)
        .await?;
    Ok(Json(DataResponse::new(questions)))
}

/// Get one question of a session
#[utoipa::path(
    get,
    path = "/{id}/questions/{question_id}",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("question_id" = Uuid, Path, description = "Session question id"),
    ),
    responses((status = 200, description = "Session question", body = SessionQuestion)),
    security(("bearer_auth" = []))
)]
pub async fn get_question(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((session_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DataResponse<SessionQuestion>>> {
    let question = state
        .services
        .session_questions
        .get_by_id(&auth.user, session_id, id)
        .await?;
    Ok(Json(DataResponse::new(question)))
}

/// Answer a question; answering again overwrites the previous answer
#[utoipa::path(
    patch,
    path = "/{id}/questions/{question_id}",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("question_id" = Uuid, Path, description = "Session question id"),
    ),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answered question", body = SessionQuestion),
        (status = 400, description = "Session finished"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn answer_question(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((session_id, id)): Path<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<AnswerRequest>,
) -> Result<Json<DataResponse<SessionQuestion>>> {
    let question = state
        .services
        .session_questions
        .answer(&auth.user, session_id, id, &body.answer)
        .await?;
    Ok(Json(DataResponse::new(question)))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_questions, get_question, answer_question),
    components(schemas(SessionQuestion, AnswerRequest))
)]
pub struct SessionQuestionsApiDoc;
