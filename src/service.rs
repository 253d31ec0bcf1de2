//! Authentication Service
//!
//! Orchestrates the credential store, password hashing and token issuance
//! for registration, login, session resolution and profile updates.

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::models::*;
use crate::password::PasswordHasher;
use crate::session::SessionCarrier;
use crate::store::{StoreError, UserStore};
use crate::token::{IssuedToken, TokenIssuer};

use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

/// Authentication service
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    session: SessionCarrier,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Result<Self, ApiError> {
        config.validate()?;

        let hasher = PasswordHasher::new(&config)?;
        let tokens = TokenIssuer::new(&config)?;
        let session = SessionCarrier::new(&config);

        Ok(Self {
            store,
            hasher,
            tokens,
            session,
        })
    }

    /// Get reference to the session cookie carrier
    pub fn session(&self) -> &SessionCarrier {
        &self.session
    }

    // ============================================
    // Password Hashing
    // ============================================

    /// Hash a password on the blocking pool; argon2 is deliberately slow
    async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// Verify a password on the blocking pool
    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new user and issue their first session token
    pub async fn register(
        &self,
        req: RegisterRequest,
    ) -> Result<(PublicUser, IssuedToken), ApiError> {
        let req = req.normalized();
        req.validate()?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(ApiError::UserExists);
        }

        let password_hash = self.hash_password(&req.password).await?;

        // a concurrent registration can still win the race; the store's
        // uniqueness check turns that into UserExists as well
        let user = self
            .store
            .insert(NewUser {
                name: req.name,
                email: req.email,
                password_hash,
            })
            .await?;

        let token = self.tokens.issue(user.id)?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok((PublicUser::from(user), token))
    }

    // ============================================
    // Login
    // ============================================

    /// Check credentials and issue a session token.
    ///
    /// Unknown email and wrong password are the same `InvalidCredentials`.
    pub async fn authenticate(
        &self,
        req: AuthRequest,
    ) -> Result<(PublicUser, IssuedToken), ApiError> {
        let email = normalize_email(&req.email);

        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !self.verify_password(&req.password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "Password verification failed");
            return Err(ApiError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id)?;

        tracing::info!(user_id = %user.id, "User authenticated");

        Ok((PublicUser::from(user), token))
    }

    // ============================================
    // Session Resolution
    // ============================================

    /// Resolve the token carried by a request to the user it belongs to.
    ///
    /// Every failure after "no token" is the same `InvalidToken`, including
    /// a valid token whose user has since been deleted.
    pub async fn resolve_session(&self, token: Option<&str>) -> Result<PublicUser, ApiError> {
        let token = token.ok_or(ApiError::MissingToken)?;

        let user_id = self.tokens.verify(token)?;

        let user = match self.store.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "Valid token for a user that no longer exists");
                return Err(ApiError::InvalidToken);
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, "Failed to resolve session user: {}", e);
                return Err(ApiError::InvalidToken);
            }
        };

        Ok(PublicUser::from(user))
    }

    // ============================================
    // Profile
    // ============================================

    /// Apply a partial profile update.
    ///
    /// Blank fields keep their current value. The password is hashed only
    /// when a new one is supplied; otherwise the stored hash is left as is.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<PublicUser, ApiError> {
        req.validate()?;

        let email = req.email().map(normalize_email);
        if let Some(email) = &email {
            if !email.validate_email() {
                return Err(ApiError::Validation("email: Invalid email format".into()));
            }
        }

        let password_hash = match req.password() {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let changes = UserChanges {
            name: req.name().map(str::to_string),
            email,
            password_hash,
        };
        let password_changed = changes.password_hash.is_some();

        let user = if changes.is_empty() {
            self.store.find_by_id(user_id).await?
        } else {
            self.store
                .update(user_id, changes)
                .await
                .map_err(|e| match e {
                    StoreError::DuplicateEmail => ApiError::EmailInUse,
                    other => ApiError::from(other),
                })?
        }
        .ok_or(ApiError::UserNotFound)?;

        tracing::info!(user_id = %user.id, password_changed, "User profile updated");

        Ok(PublicUser::from(user))
    }
}
