//! Request extractors shared by handlers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::api::dto::Validate;
use crate::error::AppError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the caller: first `X-Forwarded-For` entry, else the peer
/// socket, else empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return Ok(Self(ip.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();
        Ok(Self(peer))
    }
}

/// JSON body that must parse and pass its `Validate` checks.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(error = %rejection, "Unreadable request body");
            AppError::InvalidBody
        })?;
        body.validate()?;
        Ok(Self(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn client_ip(request: HttpRequest<()>) -> ClientIp {
        let (mut parts, _) = request.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_for_wins() {
        let request = HttpRequest::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(())
            .unwrap();
        assert_eq!(client_ip(request).await, ClientIp("203.0.113.7".into()));
    }

    #[tokio::test]
    async fn test_peer_address_fallback() {
        let request = HttpRequest::builder()
            .extension(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 4000))))
            .body(())
            .unwrap();
        assert_eq!(client_ip(request).await, ClientIp("192.168.1.20".into()));
    }

    #[tokio::test]
    async fn test_unknown_address_is_empty() {
        let request = HttpRequest::builder().body(()).unwrap();
        assert_eq!(client_ip(request).await, ClientIp(String::new()));
    }
}
