//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Name of the partial unique index that keeps one unfinished session per user.
pub const ACTIVE_SESSION_INDEX: &str = "sessions_one_active_per_user";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Record with the same unique key already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid request body")]
    InvalidBody,

    #[error("authorization header is missing")]
    AuthMissing,

    #[error("authorization header must use the Bearer scheme")]
    InvalidAuthFormat,

    #[error("unexpected token signing method")]
    InvalidSigningMethod,

    #[error("token claims have an unexpected shape")]
    InvalidClaimsType,

    /// Malformed token or signature mismatch
    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("access token expired")]
    AccessTokenExpired,

    /// No authenticated identity is attached to the request
    #[error("request has no authenticated user")]
    InvalidUserType,

    #[error("user cannot login")]
    CannotLogin,

    /// The access token points to a refresh token this user does not hold
    #[error("access and refresh tokens do not match")]
    TokensMismatch,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// External identity provider rejected the token or omitted a required claim
    #[error("invalid external identity: {0}")]
    InvalidExternalIdentity(String),

    #[error("invalid grade value")]
    InvalidGradeValue,

    #[error("access denied")]
    AccessDenied,

    #[error("user already has an active session")]
    UserHasActiveSession,

    #[error("not enough questions for the requested category and grade")]
    QuestionNotEnough,

    #[error("session is already finished")]
    SessionFinished,

    /// Field-level validation failure
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record".into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                if db.constraint() == Some(ACTIVE_SESSION_INDEX) {
                    AppError::UserHasActiveSession
                } else {
                    AppError::AlreadyExists(db.constraint().unwrap_or("record").to_string())
                }
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {err}"))
    }
}

/// Full error text for 5xx responses, attached to the response so the debug
/// layer can expose it.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "ALREADY_EXISTS"),
            AppError::InvalidBody => (StatusCode::BAD_REQUEST, "INVALID_BODY"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::InvalidGradeValue => (StatusCode::BAD_REQUEST, "INVALID_GRADE_VALUE"),
            AppError::UserHasActiveSession => (StatusCode::BAD_REQUEST, "USER_HAS_ACTIVE_SESSION"),
            AppError::QuestionNotEnough => (StatusCode::BAD_REQUEST, "QUESTION_NOT_ENOUGH"),
            AppError::SessionFinished => (StatusCode::BAD_REQUEST, "SESSION_FINISHED"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::AuthMissing => (StatusCode::UNAUTHORIZED, "AUTH_MISSING"),
            AppError::InvalidAuthFormat => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_FORMAT"),
            AppError::InvalidSigningMethod => (StatusCode::UNAUTHORIZED, "INVALID_SIGNING_METHOD"),
            AppError::InvalidClaimsType => (StatusCode::UNAUTHORIZED, "INVALID_CLAIMS_TYPE"),
            AppError::InvalidAccessToken => (StatusCode::UNAUTHORIZED, "INVALID_ACCESS_TOKEN"),
            AppError::AccessTokenExpired => (StatusCode::UNAUTHORIZED, "ACCESS_TOKEN_EXPIRED"),
            AppError::InvalidUserType => (StatusCode::UNAUTHORIZED, "INVALID_USER_TYPE"),
            AppError::TokensMismatch => (StatusCode::UNAUTHORIZED, "TOKENS_MISMATCH"),
            AppError::RefreshTokenExpired => (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_EXPIRED"),
            AppError::InvalidRefreshToken => (StatusCode::UNAUTHORIZED, "INVALID_REFRESH_TOKEN"),
            AppError::InvalidExternalIdentity(_) => {
                (StatusCode::UNAUTHORIZED, "INVALID_EXTERNAL_IDENTITY")
            }
            AppError::CannotLogin => (StatusCode::FORBIDDEN, "CANNOT_LOGIN"),
            AppError::AccessDenied => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MIGRATION_ERROR"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            AppError::AddrParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ADDR_PARSE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = code, "Request error");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            tracing::warn!(error = %self, code = code, "Request rejected");
            self.to_string()
        };

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        let mut response = (status, body).into_response();
        if status.is_server_error() {
            response.extensions_mut().insert(ErrorDetail {
                code,
                message: self.to_string(),
            });
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_kinds_map_to_unauthorized() {
        for err in [
            AppError::AuthMissing,
            AppError::InvalidAuthFormat,
            AppError::InvalidSigningMethod,
            AppError::InvalidClaimsType,
            AppError::AccessTokenExpired,
            AppError::TokensMismatch,
            AppError::RefreshTokenExpired,
            AppError::InvalidRefreshToken,
        ] {
            assert_eq!(err.status_and_code().0, StatusCode::UNAUTHORIZED, "{err}");
        }
    }

    #[test]
    fn test_forbidden_kinds() {
        assert_eq!(AppError::CannotLogin.status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::AccessDenied.status_and_code().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_session_kinds_are_bad_request() {
        assert_eq!(
            AppError::UserHasActiveSession.status_and_code(),
            (StatusCode::BAD_REQUEST, "USER_HAS_ACTIVE_SESSION")
        );
        assert_eq!(
            AppError::QuestionNotEnough.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::SessionFinished.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_error_hides_detail() {
        let response = AppError::Database("connection reset by peer".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert_eq!(detail.code, "DATABASE_ERROR");
        assert!(detail.message.contains("connection reset by peer"));
    }

    #[test]
    fn test_client_error_has_no_detail_extension() {
        let response = AppError::NotFound("session".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorDetail>().is_none());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
