//! Service Configuration
//!
//! All configuration values are loaded from environment variables once at
//! startup. No hardcoded secrets or sensitive data.

use crate::error::ApiError;
use std::env;
use std::str::FromStr;

/// Deployment mode (from APP_ENV env var)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// Read APP_ENV, falling back to development for unset or unknown values
    pub fn from_env() -> Self {
        env::var("APP_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ApiError::Config(format!("Unknown APP_ENV value: {other}"))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log output format (from LOG_FORMAT env var)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (from HOST env var)
    pub host: String,

    /// Bind port (from PORT env var)
    pub port: u16,

    /// Postgres connection string (from DATABASE_URL env var).
    /// When unset the service runs on the in-memory store.
    pub database_url: Option<String>,

    /// Deployment mode (from APP_ENV env var)
    pub environment: Environment,

    /// Frontend origin allowed to make credentialed requests (from CORS_ORIGIN env var)
    pub cors_origin: Option<String>,

    /// Log output format (from LOG_FORMAT env var)
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load server configuration from environment variables
    pub fn from_env() -> Result<Self, ApiError> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| ApiError::Config(format!("PORT must be a valid port number, got {v}")))?,
            Err(_) => 5000,
        };

        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            environment: Environment::from_env(),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT secret key for signing tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Session token lifetime in seconds (from JWT_EXPIRATION env var)
    pub token_expiration: i64,

    /// JWT issuer (from JWT_ISSUER env var)
    pub jwt_issuer: String,

    /// JWT audience (from JWT_AUDIENCE env var)
    pub jwt_audience: String,

    /// Name of the session cookie (from COOKIE_NAME env var)
    pub cookie_name: String,

    /// Mark the session cookie Secure (from COOKIE_SECURE env var)
    pub cookie_secure: bool,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,
}

/// 30 days
pub const DEFAULT_TOKEN_EXPIRATION: i64 = 30 * 24 * 60 * 60;

/// 10 years
pub const MAX_TOKEN_EXPIRATION: i64 = 10 * 365 * 24 * 60 * 60;

pub const DEFAULT_COOKIE_NAME: &str = "jwt";

impl AuthConfig {
    /// Load configuration from environment variables
    ///
    /// `environment` decides the default for the cookie Secure flag: plain
    /// HTTP is only expected during development.
    pub fn from_env(environment: Environment) -> Result<Self, ApiError> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ApiError::Config("JWT_SECRET environment variable must be set".into()))?;

        Ok(Self {
            jwt_secret,

            token_expiration: parse_or("JWT_EXPIRATION", DEFAULT_TOKEN_EXPIRATION),

            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "session-auth".to_string()),

            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "session-auth-api".to_string()),

            cookie_name: env::var("COOKIE_NAME").unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string()),

            cookie_secure: env::var("COOKIE_SECURE")
                .ok()
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(environment != Environment::Development),

            argon2_memory_cost: parse_or("ARGON2_MEMORY_COST", 65536), // 64 MiB

            argon2_time_cost: parse_or("ARGON2_TIME_COST", 3),

            argon2_parallelism: parse_or("ARGON2_PARALLELISM", 4),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.jwt_secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.token_expiration <= 0 || self.token_expiration > MAX_TOKEN_EXPIRATION {
            return Err(ApiError::Config(format!(
                "JWT_EXPIRATION must be between 1 and {MAX_TOKEN_EXPIRATION} seconds"
            )));
        }

        if self.cookie_name.trim().is_empty() {
            return Err(ApiError::Config("COOKIE_NAME must not be empty".to_string()));
        }

        argon2::Params::new(
            self.argon2_memory_cost,
            self.argon2_time_cost,
            self.argon2_parallelism,
            None,
        )
        .map_err(|e| ApiError::Config(format!("Invalid Argon2 parameters: {e}")))?;

        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "a".repeat(32),
        token_expiration: DEFAULT_TOKEN_EXPIRATION,
        jwt_issuer: "test".to_string(),
        jwt_audience: "test".to_string(),
        cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        cookie_secure: false,
        // cheap parameters keep the test suite fast
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
    }
}
