//! Assessment session handlers. Every route acts on the caller's own sessions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{require_non_empty, DataResponse, ListParams, ListResponse, Validate};
use crate::api::extract::JsonBody;
use crate::api::middleware::auth::AuthUser;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::{Session, SessionStatus};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route("/:id", get(get_session))
        .route("/:id/summarize", post(summarize_session))
        .route("/:id/cancel", post(cancel_session))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub category_id: Uuid,
    /// One of `junior`, `middle`, `senior`
    pub grade: String,
}

impl Validate for CreateSessionRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("grade", &self.grade)
    }
}

/// Session plus its derived lifecycle state
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub status: SessionStatus,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            status: session.status(),
            session,
        }
    }
}

/// List the caller's sessions, finished ones included
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    responses((status = 200, description = "Page of sessions", body = [SessionResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<SessionResponse>>> {
    let (sessions, pagination) = state
        .services
        .sessions
        .list(&auth.user, params.into_query())
        .await?;
    let sessions = sessions.into_iter().map(SessionResponse::from).collect();
    Ok(Json(ListResponse::new((sessions, pagination))))
}

/// Start a session
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 400, description = "Active session exists, unknown grade or too few questions"),
        (status = 404, description = "Category not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_session(
    State(state): State<SharedState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<CreateSessionRequest>,
) -> Result<(StatusCode, Json<DataResponse<SessionResponse>>)> {
    let session = state
        .services
        .sessions
        .create(&auth.user, body.category_id, &body.grade)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(SessionResponse::from(session))),
    ))
}

/// Get an active session
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session", body = SessionResponse),
        (status = 400, description = "Session finished"),
        (status = 403, description = "Not the session owner"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_session(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<SessionResponse>>> {
    let session = state.services.sessions.get_by_id(&auth.user, id).await?;
    Ok(Json(DataResponse::new(session.into())))
}

/// Finish a session with a summary
#[utoipa::path(
    post,
    path = "/{id}/summarize",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Finished session", body = SessionResponse)),
    security(("bearer_auth" = []))
)]
pub async fn summarize_session(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<SessionResponse>>> {
    let session = state.services.sessions.summarize(&auth.user, id).await?;
    Ok(Json(DataResponse::new(session.into())))
}

/// Finish a session without a summary
#[utoipa::path(
    post,
    path = "/{id}/cancel",
    context_path = "/api/v1/sessions",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Cancelled session", body = SessionResponse)),
    security(("bearer_auth" = []))
)]
pub async fn cancel_session(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<SessionResponse>>> {
    let session = state.services.sessions.cancel(&auth.user, id).await?;
    Ok(Json(DataResponse::new(session.into())))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sessions,
        create_session,
        get_session,
        summarize_session,
        cancel_session
    ),
    components(schemas(SessionResponse, Session, SessionStatus, CreateSessionRequest))
)]
pub struct SessionsApiDoc;
