//! Authentication Models
//!
//! Data structures for requests, responses, token claims and stored users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ============================================
// Database Entities
// ============================================

/// User entity from the credential store
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update applied by the store. `None` keeps the stored value, so
/// a write without `password_hash` never touches the existing hash.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

/// Emails are the login key; compare them trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================
// Request DTOs
// ============================================

/// Login request. Not validated: any bad input is just a failed login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl RegisterRequest {
    /// Trimmed name and normalized email, ready for validation
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// Profile update; every field is optional and empty strings count as absent
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    pub email: Option<String>,

    pub password: Option<String>,
}

impl UpdateProfileRequest {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(&self.email)
    }

    /// Passwords are taken verbatim, only an empty one is ignored
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|v| !v.is_empty())
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================
// Response DTOs
// ============================================

/// Public user data, safe to return to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Simple message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================
// JWT Claims
// ============================================

/// JWT claims for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_serialization_skips_hash() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn public_user_has_only_public_fields() {
        let user = sample_user();
        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(json["id"], user.id.to_string());
        assert_eq!(json["name"], "A");
    }

    #[test]
    fn update_request_treats_blank_as_absent() {
        let req = UpdateProfileRequest {
            name: Some("   ".into()),
            email: None,
            password: Some("".into()),
        };
        assert_eq!(req.name(), None);
        assert_eq!(req.email(), None);
        assert_eq!(req.password(), None);
    }

    #[test]
    fn register_request_validation() {
        let ok = RegisterRequest {
            name: "A".into(),
            email: "a@x.com".into(),
            password: "pw".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            name: "".into(),
            email: "not-an-email".into(),
            password: "".into(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn blank_name_fails_after_normalizing() {
        let req = RegisterRequest {
            name: "   ".into(),
            email: " A@X.com ".into(),
            password: "pw".into(),
        }
        .normalized();

        assert_eq!(req.email, "a@x.com");
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn auth_request_tolerates_missing_fields() {
        let req: AuthRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert_eq!(req.password, "");
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}
