//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

/// Default limit for uploaded report files (10 MiB)
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Whether a bearer token is mandatory on tenant-scoped routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Missing tokens are tolerated; the default tenant is used
    Optional,
    /// Every tenant-scoped request must carry a valid token
    Required,
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optional" => Ok(AuthMode::Optional),
            "required" => Ok(AuthMode::Required),
            _ => Err(ConfigError::InvalidValue("AUTH_MODE")),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue("ENVIRONMENT")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        })
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("LOG_FORMAT")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Shared rate-limit counter store
    pub redis_url: String,

    pub host: String,
    pub port: u16,

    pub environment: Environment,

    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwks_uri: String,

    /// Identity provider token endpoint
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub oidc_client_id: String,
    pub demo_username: String,
    pub demo_password: String,

    pub default_tenant_slug: String,
    pub auth_mode: AuthMode,

    /// Log per-request authentication failures
    pub auth_debug: bool,

    pub local_upload_dir: String,
    pub max_upload_bytes: usize,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::MissingEnv(key));
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_max_connections = optional("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let port = optional("PORT", "4000")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let auth_debug = match optional("AUTH_DEBUG", "false").as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(ConfigError::InvalidValue("AUTH_DEBUG")),
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MAX_UPLOAD_BYTES"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections,
            redis_url: optional("REDIS_URL", "redis://127.0.0.1:6379"),
            host: optional("HOST", "127.0.0.1"),
            port,
            environment: optional("ENVIRONMENT", "development").parse()?,
            jwt_issuer: required("JWT_ISSUER")?,
            jwt_audience: required("JWT_AUDIENCE")?,
            jwks_uri: required("KEYCLOAK_JWKS_URI")?,
            token_url: optional(
                "KEYCLOAK_TOKEN_URL",
                "http://localhost:8080/realms/finintel/protocol/openid-connect/token",
            ),
            client_id: optional("KEYCLOAK_CLIENT_ID", "finintel-api"),
            client_secret: optional("KEYCLOAK_CLIENT_SECRET", "api-secret"),
            oidc_client_id: optional("OIDC_CLIENT_ID", "finintel-web"),
            demo_username: optional("DEMO_USERNAME", "demo"),
            demo_password: optional("DEMO_PASSWORD", "Demo@1234"),
            default_tenant_slug: optional("DEFAULT_TENANT_SLUG", "tenant-1"),
            auth_mode: optional("AUTH_MODE", "optional").parse()?,
            auth_debug,
            local_upload_dir: optional("LOCAL_UPLOAD_DIR", "/tmp/finintel-uploads"),
            max_upload_bytes,
            log_format: optional("LOG_FORMAT", "pretty").parse()?,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
