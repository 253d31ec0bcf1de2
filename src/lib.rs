//! Session Auth
//!
//! Cookie-session user authentication API providing:
//! - User registration and login
//! - Argon2id password hashing
//! - JWT session tokens carried in an HttpOnly cookie
//! - Profile read and partial update
//! - A versioned client-side identity cache
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing JWTs (required, min 32 chars)
//! - `JWT_EXPIRATION` - Session lifetime in seconds (default: 2592000)
//! - `JWT_ISSUER` - JWT issuer claim (default: "session-auth")
//! - `JWT_AUDIENCE` - JWT audience claim (default: "session-auth-api")
//! - `COOKIE_NAME` - Session cookie name (default: "jwt")
//! - `COOKIE_SECURE` - Mark the cookie Secure (default: true outside development)
//! - `DATABASE_URL` - PostgreSQL connection string (optional, in-memory store otherwise)
//! - `APP_ENV` - `development`, `test` or `production` (default: development)
//!
//! # Usage
//!
//! ```rust,ignore
//! use session_auth::{create_routes, AppState, AuthConfig, AuthService, Environment, MemoryUserStore};
//!
//! let auth = AuthService::new(Arc::new(MemoryUserStore::new()), AuthConfig::from_env(env)?)?;
//! let app = create_routes(AppState::new(auth, env));
//! axum::serve(listener, app).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod session;
pub mod state;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use client::{AuthCache, FileStorage, KeyValueStore, MemoryStorage};
pub use config::{AuthConfig, Environment, LogFormat, ServerConfig};
pub use error::ApiError;
pub use extractors::CurrentUser;
pub use handlers::create_routes;
pub use models::*;
pub use service::AuthService;
pub use state::AppState;
pub use store::{MemoryUserStore, PgUserStore, StoreError, UserStore};
