//! Authentication handlers.

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::dto::{require_email, require_non_empty, DataResponse, Validate};
use crate::api::extract::{ClientIp, JsonBody};
use crate::api::middleware::auth::{auth_middleware, AuthUser};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::User;
use crate::services::auth_service::TokenPair;

/// Login, external login and refresh are public; `GET /auth` needs a token.
pub fn router(state: &SharedState) -> Router<SharedState> {
    let authenticated = from_fn_with_state(state.clone(), auth_middleware);

    Router::new()
        .route("/", post(login).merge(get(current_user).layer(authenticated)))
        .route("/google", post(google_login))
        .route("/refresh", post(refresh))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<()> {
        require_email("email", &self.email)?;
        require_non_empty("password", &self.password)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleLoginRequest {
    pub token_id: String,
}

impl Validate for GoogleLoginRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("token_id", &self.token_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<()> {
        require_non_empty("access_token", &self.access_token)?;
        require_non_empty("refresh_token", &self.refresh_token)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub data: TokenPair,
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<DataResponse<TokenPair>>> {
    let pair = state
        .services
        .auth
        .login(&body.email, &body.password, &ip)
        .await?;
    Ok(Json(DataResponse::new(pair)))
}

/// Log in with a Google id token
#[utoipa::path(
    post,
    path = "/google",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 401, description = "Identity could not be verified"),
    )
)]
pub async fn google_login(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    JsonBody(body): JsonBody<GoogleLoginRequest>,
) -> Result<Json<DataResponse<TokenPair>>> {
    let pair = state
        .services
        .auth
        .external_login(&body.token_id, &ip)
        .await?;
    Ok(Json(DataResponse::new(pair)))
}

/// Rotate a token pair
#[utoipa::path(
    post,
    path = "/refresh",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Refresh rejected"),
    )
)]
pub async fn refresh(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<DataResponse<TokenPair>>> {
    let pair = state
        .services
        .auth
        .refresh(&body.access_token, &body.refresh_token, &ip)
        .await?;
    Ok(Json(DataResponse::new(pair)))
}

/// Current user
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated user", body = User),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user(auth: AuthUser) -> Json<DataResponse<User>> {
    Json(DataResponse::new(auth.user))
}

#[derive(OpenApi)]
#[openapi(
    paths(login, google_login, refresh, current_user),
    components(schemas(LoginRequest, GoogleLoginRequest, RefreshRequest, TokenResponse, TokenPair))
)]
pub struct AuthApiDoc;
