//! Authentication and permission middleware.
//!
//! `auth_middleware` resolves `Authorization: Bearer <token>` into an
//! [`AuthUser`] request extension. `require_permission` runs after it and
//! rejects users whose roles lack the route's permission slug.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::middleware::tracing::RequestId;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::User;

/// Authenticated caller attached to the request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub request_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::InvalidUserType)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`. The scheme is
/// matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header = headers.get(AUTHORIZATION).ok_or(AppError::AuthMissing)?;
    let value = header.to_str().map_err(|_| AppError::InvalidAuthFormat)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AppError::InvalidAuthFormat),
    }
}

/// Authentication middleware - requires a valid, unexpired access token
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers())?.to_string();
    let user = state.services.auth.authenticate(&token).await?;

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(RequestId::generate);
    tracing::debug!(user_id = %user.id, "Request authenticated");

    request.extensions_mut().insert(AuthUser {
        user,
        request_id: request_id.0,
    });
    Ok(next.run(request).await)
}

/// State for [`require_permission`]: the app state plus the slug a route needs.
#[derive(Clone)]
pub struct PermissionGate {
    state: SharedState,
    slug: &'static str,
}

impl PermissionGate {
    pub fn new(state: SharedState, slug: &'static str) -> Self {
        Self { state, slug }
    }
}

/// Permission middleware - must run inside `auth_middleware`
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .map(|auth| auth.user.clone())
        .ok_or(AppError::InvalidUserType)?;

    if !gate
        .state
        .services
        .users
        .has_permission(&user, gate.slug)
        .await?
    {
        tracing::warn!(user_id = %user.id, permission = gate.slug, "Permission denied");
        return Err(AppError::AccessDenied);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::AuthMissing)
        ));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("BEARER abc")).unwrap(), "abc");
    }

    #[test]
    fn test_malformed_headers() {
        for value in ["Bearer", "Basic abc", "Bearer a b", "abc", ""] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(AppError::InvalidAuthFormat)),
                "{value:?} accepted"
            );
        }
    }
}
