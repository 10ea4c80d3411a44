//! Permission management handlers.

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
use crate::models::Permission;

/// Create permission routes
pub fn router(state: &SharedState) -> Router<SharedState> {
    let gate = |slug: &'static str| {
        from_fn_with_state(PermissionGate::new(state.clone(), slug), require_permission)
    };

    Router::new()
        .route(
            "/",
            get(list_permissions)
                .layer(gate("permission-read"))
                .merge(post(create_permission).layer(gate("permission-create"))),
        )
        .route(
            "/:id",
            get(get_permission)
                .layer(gate("permission-read"))
                .merge(patch(update_permission).layer(gate("permission-update")))
                .merge(delete(delete_permission).layer(gate("permission-delete"))),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePermissionRequest {
    pub name: String,
    /// Derived from the name when omitted
    pub slug: Option<String>,
}

impl Validate for CreatePermissionRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        if let Some(slug) = &self.slug {
            require_non_empty("slug", slug)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl Validate for UpdatePermissionRequest {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(slug) = &self.slug {
            require_non_empty("slug", slug)?;
        }
        Ok(())
    }
}

/// List permissions
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    responses((status = 200, description = "Page of permissions", body = [Permission])),
    security(("bearer_auth" = []))
)]
pub async fn list_permissions(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Permission>>> {
    let page = state.services.permissions.list(params.into_query()).await?;
    Ok(Json(ListResponse::new(page)))
}

/// Create a permission
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    request_body = CreatePermissionRequest,
    responses((status = 201, description = "Permission created", body = Permission)),
    security(("bearer_auth" = []))
)]
pub async fn create_permission(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<DataResponse<Permission>>)> {
    let permission = state
        .services
        .permissions
        .create(&body.name, body.slug.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(permission))))
}

/// Get a permission
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    params(("id" = Uuid, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Permission>>> {
    let permission = state.services.permissions.get_by_id(id).await?;
    Ok(Json(DataResponse::new(permission)))
}

/// Update a permission
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    params(("id" = Uuid, Path, description = "Permission id")),
    request_body = UpdatePermissionRequest,
    responses((status = 200, description = "Updated permission", body = Permission)),
    security(("bearer_auth" = []))
)]
pub async fn update_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdatePermissionRequest>,
) -> Result<Json<DataResponse<Permission>>> {
    let permission = state
        .services
        .permissions
        .update(id, body.name.as_deref(), body.slug.as_deref())
        .await?;
    Ok(Json(DataResponse::new(permission)))
}

/// Delete a permission
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    params(("id" = Uuid, Path, description = "Permission id")),
    responses((status = 204, description = "Permission deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.services.permissions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_permissions,
        create_permission,
        get_permission,
        update_permission,
        delete_permission
    ),
    components(schemas(Permission, CreatePermissionRequest, UpdatePermissionRequest))
)]
pub struct PermissionsApiDoc;
