use crate::models::{NewUser, User, UserCredentials};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all user-store operations. This is the core of the
/// Repository Abstraction pattern, allowing the handlers and the session layer to interact
/// with persistence without knowing the specific implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Retrieval ---
    // Canonical identity lookup used after login and by diagnostics.
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Login path: resolves an email to the stored credential hash. Never exposes the
    // hash beyond the login handler.
    async fn get_credentials(&self, email: &str) -> Option<UserCredentials>;

    // --- Identity Lifecycle ---
    // Registration. Returns None when the email is already taken (or on a database
    // failure, which is logged); the caller maps None to a conflict response.
    async fn create_user(&self, user: NewUser) -> Option<User>;

    // --- Gated Write Action ---
    // The dashboard page's form action. Returns the updated row, or None if the user
    // row no longer exists.
    async fn set_display_name(&self, user_id: Uuid, display_name: String) -> Option<User>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PgRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
///
/// Expected schema (`public.users`):
/// `id UUID PK, email TEXT UNIQUE, display_name TEXT, role TEXT, password_hash TEXT,
///  created_at TIMESTAMPTZ, updated_at TIMESTAMPTZ`.
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    /// get_user
    ///
    /// Retrieves the identity record (id, email, display name, role) by primary key.
    /// The password hash is intentionally not selected.
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user error: {:?}", e);
            None
        })
    }

    /// get_credentials
    ///
    /// Retrieves the minimal credential projection for the login flow. Email matching is
    /// exact; normalization (lowercasing) is the registration path's responsibility.
    async fn get_credentials(&self, email: &str) -> Option<UserCredentials> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_credentials error: {:?}", e);
            None
        })
    }

    /// create_user
    ///
    /// Inserts a new user row. Uses `ON CONFLICT (email) DO NOTHING` so a duplicate
    /// registration surfaces as None rather than a database error, mirroring how the
    /// caller wants to branch (409) without parsing constraint names.
    async fn create_user(&self, user: NewUser) -> Option<User> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name, role, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, 'member', $4, NOW(), NOW())
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, display_name, role
            "#,
        )
        .bind(new_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_user error: {:?}", e);
            None
        })
    }

    /// set_display_name
    ///
    /// The gated write action behind the dashboard form. Returns None only if the user
    /// row has vanished since the session was resolved.
    async fn set_display_name(&self, user_id: Uuid, display_name: String) -> Option<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, display_name, role
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("set_display_name error: {:?}", e);
            None
        })
    }
}
