//! Credential Store
//!
//! Persistence for user records. Email uniqueness is enforced here, by the
//! store, and never re-checked for correctness by callers. The store never
//! hashes: `password_hash` values arrive already hashed.

use crate::models::{NewUser, User, UserChanges};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Postgres error code for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Credential store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    /// An externally supplied id that is not a UUID. Lookups by such an id
    /// surface as 404 `Resource not found`; the session gate maps it to an
    /// invalid token instead.
    #[error("Malformed user id: {0}")]
    MalformedId(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::DuplicateEmail;
            }
        }

        tracing::error!("Database error: {:?}", err);
        StoreError::Database(err.to_string())
    }
}

/// Parse an externally supplied user id
pub fn parse_user_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::MalformedId(raw.to_string()))
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; fails with `DuplicateEmail` if the email is taken
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Apply a partial update; `None` when the user does not exist
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Delete a user; `false` when the user did not exist
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

// ============================================
// Postgres
// ============================================

/// Postgres-backed store
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db = PgPool::connect(database_url).await?;
        let store = Self::new(db);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        tracing::info!("Running user store migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        tracing::info!("User store migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================
// In-memory
// ============================================

/// Process-local store for development and tests. Data is lost on restart.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if email_taken(&users, &user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if email_taken(&users, email, Some(id)) {
                return Err(StoreError::DuplicateEmail);
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "A".into(),
            email: email.into(),
            password_hash: "$argon2id$hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = MemoryUserStore::new();
        let user = assert_ok!(store.insert(new_user("a@x.com")).await);

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        let by_email = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        let first = store.insert(new_user("a@x.com")).await.unwrap();

        let err = assert_err!(store.insert(new_user("a@x.com")).await);
        assert!(matches!(err, StoreError::DuplicateEmail));

        assert_eq!(store.len().await, 1);
        let kept = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(kept.id, first.id);
    }

    #[tokio::test]
    async fn update_without_hash_keeps_hash() {
        let store = MemoryUserStore::new();
        let user = store.insert(new_user("a@x.com")).await.unwrap();

        let changes = UserChanges {
            name: Some("B".into()),
            ..Default::default()
        };
        let updated = store.update(user.id, changes).await.unwrap().unwrap();

        assert_eq!(updated.name, "B");
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.password_hash, user.password_hash);
        assert!(updated.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn update_to_taken_email_is_rejected() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a@x.com")).await.unwrap();
        store.insert(new_user("b@x.com")).await.unwrap();

        let changes = UserChanges {
            email: Some("b@x.com".into()),
            ..Default::default()
        };
        let err = assert_err!(store.update(a.id, changes).await);
        assert!(matches!(err, StoreError::DuplicateEmail));

        // re-saving the own email is fine
        let changes = UserChanges {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        assert_ok!(store.update(a.id, changes).await);
    }

    #[tokio::test]
    async fn update_and_delete_missing_user() {
        let store = MemoryUserStore::new();
        let missing = Uuid::new_v4();

        assert!(store
            .update(missing, UserChanges::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete(missing).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let store = MemoryUserStore::new();
        let user = store.insert(new_user("a@x.com")).await.unwrap();

        assert!(store.delete(user.id).await.unwrap());
        assert!(store.is_empty().await);
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
    }

    #[test]
    fn parse_user_id_rejects_malformed() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_user_id("507f1f77bcf86cd799439011"),
            Err(StoreError::MalformedId(_))
        ));
    }
}
