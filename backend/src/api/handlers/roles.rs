//! Role management handlers.

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
use crate::models::Role;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let gate = |slug: &'static str| {
        from_fn_with_state(PermissionGate::new(state.clone(), slug), require_permission)
    };

    Router::new()
        .route(
            "/",
            get(list_roles)
                .layer(gate("role-read"))
                .merge(post(create_role).layer(gate("role-create"))),
        )
        .route(
            "/:id",
            get(get_role)
                .layer(gate("role-read"))
                .merge(patch(update_role).layer(gate("role-update")))
                .merge(delete(delete_role).layer(gate("role-delete"))),
        )
        .route(
            "/:id/permissions/:permission_id",
            post(add_permission)
                .merge(delete(remove_permission))
                .layer(gate("role-update")),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    pub name: String,
}

impl Validate for RoleRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

/// List roles
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/roles",
    tag = "roles",
    responses((status = 200, description = "Page of roles", body = [Role])),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Role>>> {
    let page = state.services.roles.list(params.into_query()).await?;
    Ok(Json(ListResponse::new(page)))
}

/// Create a role
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/roles",
    tag = "roles",
    request_body = RoleRequest,
    responses((status = 201, description = "Role created", body = Role)),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> Result<(StatusCode, Json<DataResponse<Role>>)> {
    let role = state.services.roles.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(role))))
}

/// Get a role
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Role not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Role>>> {
    let role = state.services.roles.get_by_id(id).await?;
    Ok(Json(DataResponse::new(role)))
}

/// Rename a role
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = RoleRequest,
    responses((status = 200, description = "Updated role", body = Role)),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> Result<Json<DataResponse<Role>>> {
    let role = state.services.roles.update(id, &body.name).await?;
    Ok(Json(DataResponse::new(role)))
}

/// Delete a role
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses((status = 204, description = "Role deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.services.roles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach a permission to a role
#[utoipa::path(
    post,
    path = "/{id}/permissions/{permission_id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(
        ("id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id"),
    ),
    responses((status = 200, description = "Role with the permission", body = Role)),
    security(("bearer_auth" = []))
)]
pub async fn add_permission(
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DataResponse<Role>>> {
    let role = state.services.roles.add_permission(id, permission_id).await?;
    Ok(Json(DataResponse::new(role)))
}

/// Detach a permission from a role
#[utoipa::path(
    delete,
    path = "/{id}/permissions/{permission_id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(
        ("id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id"),
    ),
    responses((status = 200, description = "Role without the permission", body = Role)),
    security(("bearer_auth" = []))
)]
pub async fn remove_permission(
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DataResponse<Role>>> {
    let role = state
        .services
        .roles
        .remove_permission(id, permission_id)
        .await?;
    Ok(Json(DataResponse::new(role)))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_roles,
        create_role,
        get_role,
        update_role,
        delete_role,
        add_permission,
        remove_permission
    ),
    components(schemas(Role, RoleRequest))
)]
pub struct RolesApiDoc;
