//! Route definitions for the API.

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::auth::auth_middleware;
use super::middleware::debug::error_detail_middleware;
use super::middleware::tracing::request_id_middleware;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes(&state));

    if state.config.is_debug {
        tracing::info!("Debug mode enabled: server error details are exposed");
        router = router.layer(from_fn(error_detail_middleware));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: &SharedState) -> Router<SharedState> {
    let openapi = Arc::new(super::openapi::build_openapi());

    // Everything except auth and the OpenAPI document needs a valid access token.
    let protected = Router::new()
        .nest("/users", handlers::users::router(state))
        .nest("/roles", handlers::roles::router(state))
        .nest("/permissions", handlers::permissions::router(state))
        .nest("/categories", handlers::categories::router(state))
        .nest("/questions", handlers::questions::router(state))
        .nest(
            "/sessions",
            handlers::sessions::router().merge(handlers::session_questions::router()),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route(
            "/openapi.json",
            get(move || {
                let openapi = openapi.clone();
                async move { Json(openapi.as_ref().clone()) }
            }),
        )
        .nest("/auth", handlers::auth::router(state))
        .merge(protected)
}
