//! User management handlers.

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

use crate::api::dto::{
    require_email, require_min_len, require_non_empty, DataResponse, ListParams, ListResponse,
    Validate,
};
use crate::api::extract::JsonBody;
use crate::api::middleware::auth::{require_permission, PermissionGate};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::User;
use crate::services::user_service::{NewUser, UserChanges};

const MIN_PASSWORD_LEN: usize = 6;

/// Create user routes. Expects `auth_middleware` to be layered outside.
pub fn router(state: &SharedState) -> Router<SharedState> {
    let gate = |slug: &'static str| {
        from_fn_with_state(PermissionGate::new(state.clone(), slug), require_permission)
    };

    Router::new()
        .route(
            "/",
            get(list_users)
                .layer(gate("user-read"))
                .merge(post(create_user).layer(gate("user-create"))),
        )
        .route(
            "/:id",
            get(get_user)
                .layer(gate("user-read"))
                .merge(patch(update_user).layer(gate("user-update")))
                .merge(delete(delete_user).layer(gate("user-delete"))),
        )
        .route(
            "/:id/roles/:role_id",
            post(add_role)
                .merge(delete(remove_role))
                .layer(gate("user-update")),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<()> {
        require_email("email", &self.email)?;
        require_non_empty("name", &self.name)?;
        require_min_len("password", &self.password, MIN_PASSWORD_LEN)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }
}

/// List users
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    responses((status = 200, description = "Page of users", body = [User])),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<User>>> {
    let page = state.services.users.list(params.into_query()).await?;
    Ok(Json(ListResponse::new(page)))
}

/// Create a user
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Email already registered"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<DataResponse<User>>)> {
    let user = state
        .services
        .users
        .create(NewUser {
            email: body.email,
            name: body.name,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(user))))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<User>>> {
    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(DataResponse::new(user)))
}

/// Update a user's profile
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated user", body = User)),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<DataResponse<User>>> {
    let user = state
        .services
        .users
        .update(
            id,
            UserChanges {
                name: body.name,
                avatar: body.avatar,
            },
        )
        .await?;
    Ok(Json(DataResponse::new(user)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant a role to a user
#[utoipa::path(
    post,
    path = "/{id}/roles/{role_id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("role_id" = Uuid, Path, description = "Role id"),
    ),
    responses((status = 200, description = "User with the role", body = User)),
    security(("bearer_auth" = []))
)]
pub async fn add_role(
    State(state): State<SharedState>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DataResponse<User>>> {
    let user = state.services.users.add_role(id, role_id).await?;
    Ok(Json(DataResponse::new(user)))
}

/// Revoke a role from a user
#[utoipa::path(
    delete,
    path = "/{id}/roles/{role_id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("role_id" = Uuid, Path, description = "Role id"),
    ),
    responses((status = 200, description = "User without the role", body = User)),
    security(("bearer_auth" = []))
)]
pub async fn remove_role(
    State(state): State<SharedState>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DataResponse<User>>> {
    let user = state.services.users.remove_role(id, role_id).await?;
    Ok(Json(DataResponse::new(user)))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, update_user, delete_user, add_role, remove_role),
    components(schemas(User, CreateUserRequest, UpdateUserRequest))
)]
pub struct UsersApiDoc;
