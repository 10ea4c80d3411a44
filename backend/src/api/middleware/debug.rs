//! Exposes server error details. Installed only when `IS_DEBUG` is set.

use axum::{extract::Request, middleware::Next, response::IntoResponse, response::Response, Json};
use serde_json::json;

use crate::error::ErrorDetail;

/// Replace the generic 5xx message with the underlying error text.
pub async fn error_detail_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(detail) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    let body = Json(json!({
        "code": detail.code,
        "message": detail.message,
    }));
    (response.status(), body).into_response()
}
