//! External identity verification (Google sign-in).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Profile claims taken from a verified external token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    pub avatar: String,
}

/// Verifies an externally issued id token and returns its profile claims.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity>;
}

/// Claims returned by Google's tokeninfo endpoint. Everything arrives as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Checks Google id tokens against the tokeninfo endpoint.
pub struct GoogleIdentityVerifier {
    http_client: Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleIdentityVerifier {
    pub fn new(client_id: String, tokeninfo_url: String) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            client_id,
            tokeninfo_url,
        })
    }

    fn identity_from(&self, info: TokenInfo) -> Result<ExternalIdentity> {
        if info.aud.as_deref() != Some(self.client_id.as_str()) {
            return Err(AppError::InvalidExternalIdentity(
                "token was issued for another client".into(),
            ));
        }
        if info.email_verified.as_deref() == Some("false") {
            return Err(AppError::InvalidExternalIdentity("email is not verified".into()));
        }
        let claim = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::InvalidExternalIdentity(format!("missing {name} claim")))
        };
        Ok(ExternalIdentity {
            email: claim(info.email, "email")?,
            name: claim(info.name, "name")?,
            avatar: claim(info.picture, "picture")?,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity> {
        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Token verification request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::InvalidExternalIdentity(format!(
                "provider rejected token ({})",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|_| AppError::InvalidExternalIdentity("unreadable token info".into()))?;
        self.identity_from(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> GoogleIdentityVerifier {
        GoogleIdentityVerifier::new("client-1".into(), "http://127.0.0.1:9".into()).unwrap()
    }

    fn info() -> TokenInfo {
        TokenInfo {
            aud: Some("client-1".into()),
            email: Some("jane@example.com".into()),
            email_verified: Some("true".into()),
            name: Some("Jane".into()),
            picture: Some("https://example.com/jane.png".into()),
        }
    }

    #[test]
    fn test_complete_claims_accepted() {
        let identity = verifier().identity_from(info()).unwrap();
        assert_eq!(identity.email, "jane@example.com");
        assert_eq!(identity.avatar, "https://example.com/jane.png");
    }

    #[test]
    fn test_missing_picture_rejected() {
        let mut claims = info();
        claims.picture = None;
        let err = verifier().identity_from(claims).unwrap_err();
        assert!(matches!(err, AppError::InvalidExternalIdentity(msg) if msg.contains("picture")));
    }

    #[test]
    fn test_foreign_audience_rejected() {
        let mut claims = info();
        claims.aud = Some("someone-else".into());
        assert!(verifier().identity_from(claims).is_err());
    }
}
