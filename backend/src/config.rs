//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;
use std::str::FromStr;

/// bcrypt only hashes the first 72 bytes of its input; a base64-encoded
/// secret of 54 raw bytes is exactly 72 characters.
const MAX_REFRESH_TOKEN_LENGTH: usize = 54;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 87_600;

/// Where records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Config(format!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    pub store_backend: StoreBackend,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Expose internal error detail in 5xx responses
    pub is_debug: bool,

    /// "json" switches log output to JSON lines
    pub log_format: String,

    /// HMAC key for access tokens
    pub jwt_secret: String,

    pub access_token_ttl_hours: i64,

    pub refresh_token_ttl_hours: i64,

    /// Raw random bytes in a refresh secret, before base64 encoding
    pub refresh_token_length: usize,

    pub bcrypt_cost: u32,

    /// Number of questions drawn into every session
    pub session_question_count: usize,

    /// Hard cap on list page size
    pub list_max_count: u32,

    /// Background worker tasks
    pub worker_pool_count: usize,

    /// Google OAuth client id; external login is disabled when unset
    pub google_client_id: Option<String>,

    pub google_tokeninfo_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let store_backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL not set".into()));
        }

        let config = Self {
            database_url,
            store_backend,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            is_debug: env_flag("IS_DEBUG"),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::Config("JWT_SECRET not set".into()))?,
            access_token_ttl_hours: env_parse("ACCESS_TOKEN_TTL_HOURS", 2),
            refresh_token_ttl_hours: env_parse("REFRESH_TOKEN_TTL_HOURS", 24),
            refresh_token_length: env_parse("REFRESH_TOKEN_LENGTH", 50),
            bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            session_question_count: env_parse("SESSION_QUESTION_COUNT", 10),
            list_max_count: env_parse("LIST_MAX_COUNT", 200),
            worker_pool_count: env_parse("WORKER_POOL_COUNT", 10),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok().filter(|s| !s.is_empty()),
            google_tokeninfo_url: env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would break token or session semantics.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be empty".into()));
        }
        if self.refresh_token_length == 0 || self.refresh_token_length > MAX_REFRESH_TOKEN_LENGTH {
            return Err(AppError::Config(format!(
                "REFRESH_TOKEN_LENGTH must be between 1 and {MAX_REFRESH_TOKEN_LENGTH}"
            )));
        }
        for (key, hours) in [
            ("ACCESS_TOKEN_TTL_HOURS", self.access_token_ttl_hours),
            ("REFRESH_TOKEN_TTL_HOURS", self.refresh_token_ttl_hours),
        ] {
            if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
                return Err(AppError::Config(format!(
                    "{key} must be between 1 and {MAX_TOKEN_TTL_HOURS}"
                )));
            }
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(AppError::Config(format!(
                "BCRYPT_COST must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"
            )));
        }
        if self.session_question_count == 0 {
            return Err(AppError::Config("SESSION_QUESTION_COUNT must be positive".into()));
        }
        if self.list_max_count == 0 {
            return Err(AppError::Config("LIST_MAX_COUNT must be positive".into()));
        }
        if self.worker_pool_count == 0 {
            return Err(AppError::Config("WORKER_POOL_COUNT must be positive".into()));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: None,
        store_backend: StoreBackend::Memory,
        bind_address: "127.0.0.1:0".into(),
        is_debug: false,
        log_format: "text".into(),
        jwt_secret: "test-secret".into(),
        access_token_ttl_hours: 2,
        refresh_token_ttl_hours: 24,
        refresh_token_length: 50,
        bcrypt_cost: MIN_BCRYPT_COST,
        session_question_count: 10,
        list_max_count: 200,
        worker_pool_count: 2,
        google_client_id: None,
        google_tokeninfo_url: "http://127.0.0.1:9/tokeninfo".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_refresh_token_length_bounded_by_bcrypt() {
        let mut config = test_config();
        config.refresh_token_length = 60;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        config.refresh_token_length = 54;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_ttls_must_be_in_range() {
        for hours in [0, -5, MAX_TOKEN_TTL_HOURS + 1, i64::MAX / 1000] {
            let mut config = test_config();
            config.access_token_ttl_hours = hours;
            assert!(matches!(config.validate(), Err(AppError::Config(_))), "{hours}");

            let mut config = test_config();
            config.refresh_token_ttl_hours = hours;
            assert!(matches!(config.validate(), Err(AppError::Config(_))), "{hours}");
        }

        let mut config = test_config();
        config.access_token_ttl_hours = 1;
        config.refresh_token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = test_config();
        config.jwt_secret.clear();
        assert!(config.validate().is_err());
    }
}
