//! Authentication service.
//!
//! Issues HMAC-signed access tokens paired with single-use refresh tokens.
//! An access token embeds the id of the refresh token it was issued with;
//! a refresh is only honoured when both halves of the pair still match.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{RefreshToken, User};
use crate::services::identity_service::IdentityVerifier;
use crate::services::user_service::UserService;
use crate::store::RefreshTokenStore;

/// Algorithm used for every token this service signs.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// Access token payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Address the token was issued to
    pub ip: String,
    pub user_id: Uuid,
    /// Refresh token this access token is paired with
    pub refresh_token_id: Uuid,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Token pair response
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    /// Single-use secret for `/auth/refresh`; only its hash is stored
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

/// Authentication service
pub struct AuthService {
    users: Arc<UserService>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    identity: Option<Arc<dyn IdentityVerifier>>,
    config: Arc<Config>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(
        users: Arc<UserService>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        identity: Option<Arc<dyn IdentityVerifier>>,
        config: Arc<Config>,
    ) -> Self {
        let secret = config.jwt_secret.clone();
        Self {
            users,
            refresh_tokens,
            identity,
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Exchange email and password for a token pair.
    ///
    /// An unknown email and a wrong password fail identically.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str, ip: &str) -> Result<TokenPair> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(AppError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AppError::InvalidCredentials)?;
        if !UserService::verify_password(password, hash)? {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.create_tokens(&user, ip).await
    }

    /// Exchange an external id token for a token pair, creating the local
    /// account on first login.
    #[instrument(skip_all)]
    pub async fn external_login(&self, id_token: &str, ip: &str) -> Result<TokenPair> {
        let verifier = self.identity.as_ref().ok_or_else(|| {
            AppError::InvalidExternalIdentity("external login is not configured".into())
        })?;
        let identity = verifier.verify(id_token).await?;
        let user = self.users.get_or_create(identity).await?;
        tracing::info!(user_id = %user.id, "User logged in with external identity");
        self.create_tokens(&user, ip).await
    }

    /// Verify an access token's signature and decode its claims.
    ///
    /// Any HMAC algorithm is accepted; everything else, including `none`,
    /// fails with `InvalidSigningMethod`. Expiry is not checked here.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims> {
        let algorithm = match declared_algorithm(token)?.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => return Err(AppError::InvalidSigningMethod),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    AppError::InvalidClaimsType
                }
                ErrorKind::InvalidAlgorithm => AppError::InvalidSigningMethod,
                _ => AppError::InvalidAccessToken,
            })
    }

    /// Resolve the user behind a bearer token: signature, expiry, then the
    /// account itself. A token for a deleted account fails with `CannotLogin`.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.decode_access_token(token)?;
        if claims.is_expired() {
            return Err(AppError::AccessTokenExpired);
        }
        self.resolve_user(claims.user_id).await
    }

    /// Rotate a token pair.
    ///
    /// The access token may be expired but must carry a valid signature.
    /// The refresh secret is single-use: a successful refresh replaces it.
    #[instrument(skip_all)]
    pub async fn refresh(&self, access_token: &str, secret: &str, ip: &str) -> Result<TokenPair> {
        let claims = self.decode_access_token(access_token)?;
        let user = self.resolve_user(claims.user_id).await?;

        if claims.ip != ip {
            tracing::warn!(
                user_id = %user.id,
                token_ip = %claims.ip,
                request_ip = %ip,
                "Token refresh from a different address"
            );
        }

        let stored = match self
            .refresh_tokens
            .get_by_user_and_id(user.id, claims.refresh_token_id)
            .await
        {
            Ok(token) => token,
            Err(AppError::NotFound(_)) => return Err(AppError::TokensMismatch),
            Err(e) => return Err(e),
        };

        if stored.is_expired(Utc::now()) {
            return Err(AppError::RefreshTokenExpired);
        }
        if !UserService::verify_password(secret, &stored.token_hash)? {
            return Err(AppError::InvalidRefreshToken);
        }

        self.create_tokens(&user, ip).await
    }

    async fn resolve_user(&self, user_id: Uuid) -> Result<User> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(AppError::NotFound(_)) => Err(AppError::CannotLogin),
            Err(e) => Err(e),
        }
    }

    /// Issue a fresh refresh token (superseding the previous one) and an
    /// access token bound to it.
    async fn create_tokens(&self, user: &User, ip: &str) -> Result<TokenPair> {
        let now = Utc::now();
        let expires_in = self
            .config
            .access_token_ttl_hours
            .checked_mul(3600)
            .ok_or_else(|| AppError::Config("ACCESS_TOKEN_TTL_HOURS out of range".into()))?;
        let secret = self.generate_refresh_secret();

        let refresh_token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            ip: ip.to_string(),
            token_hash: UserService::hash_password(&secret, self.config.bcrypt_cost)?,
            expires_at: expiry(now, self.config.refresh_token_ttl_hours)?,
            created_at: now,
        };
        self.refresh_tokens.replace_for_user(&refresh_token).await?;

        let access_token = self.sign_access_token(user.id, refresh_token.id, ip)?;
        Ok(TokenPair {
            access_token,
            refresh_token: secret,
            expires_in,
        })
    }

    fn sign_access_token(&self, user_id: Uuid, refresh_token_id: Uuid, ip: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            ip: ip.to_string(),
            user_id,
            refresh_token_id,
            iat: now.timestamp(),
            exp: expiry(now, self.config.access_token_ttl_hours)?.timestamp(),
        };
        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
    }

    fn generate_refresh_secret(&self) -> String {
        let mut bytes = vec![0u8; self.config.refresh_token_length];
        rand::rng().fill_bytes(&mut bytes);
        STANDARD.encode(bytes)
    }
}

/// The `alg` a token declares in its header, read before any verification.
/// `now` plus `hours`, or a config error when the result is not representable.
fn expiry(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>> {
    Duration::try_hours(hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::Config(format!("token TTL of {hours} hours is out of range")))
}

fn declared_algorithm(token: &str) -> Result<String> {
    let header = token
        .split('.')
        .next()
        .filter(|h| !h.is_empty())
        .ok_or(AppError::InvalidAccessToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| AppError::InvalidAccessToken)?;
    let header: JoseHeader =
        serde_json::from_slice(&bytes).map_err(|_| AppError::InvalidAccessToken)?;
    Ok(header.alg)
}
