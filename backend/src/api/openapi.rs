//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::store::Pagination;

/// Top-level OpenAPI document for the Tech Check API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tech Check API",
        description = "Timed technical-assessment sessions with role-based access."
    ),
    servers((url = "/", description = "Current server")),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and token rotation"),
        (name = "users", description = "User management and role grants"),
        (name = "roles", description = "Roles and their permissions"),
        (name = "permissions", description = "Permission catalog"),
        (name = "categories", description = "Question categories"),
        (name = "questions", description = "Question catalog"),
        (name = "sessions", description = "Assessment sessions and answers"),
        (name = "health", description = "Liveness check"),
    ),
    components(schemas(ErrorResponse, Pagination))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "ACCESS_DENIED")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Adds Bearer JWT security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    use super::handlers;

    let mut doc = ApiDoc::openapi();
    doc.merge(handlers::health::HealthApiDoc::openapi());
    doc.merge(handlers::auth::AuthApiDoc::openapi());
    doc.merge(handlers::users::UsersApiDoc::openapi());
    doc.merge(handlers::roles::RolesApiDoc::openapi());
    doc.merge(handlers::permissions::PermissionsApiDoc::openapi());
    doc.merge(handlers::categories::CategoriesApiDoc::openapi());
    doc.merge(handlers::questions::QuestionsApiDoc::openapi());
    doc.merge(handlers::sessions::SessionsApiDoc::openapi());
    doc.merge(handlers::session_questions::SessionQuestionsApiDoc::openapi());
    doc
}
