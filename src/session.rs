use crate::models::{Session, User};
use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the session cookie issued at login and read on every request.
pub const SESSION_COOKIE: &str = "portal_session";

// 1. SessionStore Contract
/// SessionStore
///
/// Defines the abstract contract for the session-authentication adapter. This trait allows
/// us to swap the concrete implementation—from the real Postgres-backed store
/// (PgSessionStore) in production to an in-memory mock during testing—without affecting
/// the middleware or handlers.
///
/// Resolution failures of every kind (unknown token, expired session, database outage)
/// are normalized to `None` here, so downstream code only ever reasons about
/// presence/absence of an identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolves a raw cookie value into the identity and session it binds, or absence.
    /// Called exactly once per request by the resolution middleware, before any guard runs.
    async fn resolve_session(&self, token: &str) -> Option<(User, Session)>;

    /// Creates a session for the user at login. Returns None on a storage failure
    /// (logged); the login handler maps that to an internal error.
    async fn create_session(&self, user_id: Uuid) -> Option<Session>;

    /// Destroys a session at logout. Returns true if a row was actually deleted.
    async fn destroy_session(&self, token: &str) -> bool;

    /// Deletes every expired session row. Run once at startup; returns the count removed.
    async fn purge_expired(&self) -> u64;
}

/// SessionStoreState
///
/// The concrete type used to share the session adapter across the application state.
pub type SessionStoreState = Arc<dyn SessionStore>;

/// generate_session_token
///
/// 32 bytes from the operating system RNG, URL-safe base64 without padding (43 chars).
/// The token doubles as the sessions table primary key, so it must be unguessable.
///
/// # Panics
/// Panics if the OS entropy source is unavailable, which is unrecoverable for an
/// authentication service.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).expect("FATAL: operating system RNG unavailable");
    URL_SAFE_NO_PAD.encode(bytes)
}

/// session_cookie
///
/// Builds the Set-Cookie value for a freshly created session: HttpOnly (no script
/// access), SameSite=Lax, host-wide path, expiry matching the session row, and Secure
/// according to the deployment environment switch.
pub fn session_cookie(session: &Session, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// clear_session_cookie
///
/// Builds the cookie used to instruct the jar to drop the session cookie at logout.
/// Path must match the one set at login for browsers to honor the removal.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

// 2. The Real Implementation (Postgres)
/// PgSessionStore
///
/// The concrete session adapter, backed by the same PostgreSQL database as the user
/// repository.
///
/// Expected schema (`public.sessions`):
/// `token TEXT PK, user_id UUID REFERENCES users(id) ON DELETE CASCADE,
///  expires_at TIMESTAMPTZ`.
pub struct PgSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgSessionStore {
    /// new
    ///
    /// Constructs the store around the shared connection pool. The TTL is fixed at
    /// construction, which keeps session lifetime a startup-time decision.
    pub fn new(pool: PgPool, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }
}

/// SessionUserRow
///
/// Flat projection of the session/user join used by `resolve_session`, split into the
/// two domain structs after the expiry check.
#[derive(sqlx::FromRow)]
struct SessionUserRow {
    token: String,
    user_id: Uuid,
    expires_at: chrono::DateTime<Utc>,
    email: String,
    display_name: String,
    role: String,
}

#[async_trait]
impl SessionStore for PgSessionStore {
    /// resolve_session
    ///
    /// Single joined lookup: the session row plus the identity it binds. A hit on an
    /// expired row deletes it immediately so a stale token cannot linger in the table,
    /// then reports absence exactly like an unknown token.
    async fn resolve_session(&self, token: &str) -> Option<(User, Session)> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT s.token, s.user_id, s.expires_at, u.email, u.display_name, u.role
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("resolve_session error: {:?}", e);
            None
        })?;

        let session = Session {
            token: row.token,
            user_id: row.user_id,
            expires_at: row.expires_at,
        };

        if session.is_expired() {
            self.destroy_session(&session.token).await;
            return None;
        }

        let user = User {
            id: row.user_id,
            email: row.email,
            display_name: row.display_name,
            role: row.role,
        };

        Some((user, session))
    }

    /// create_session
    ///
    /// Generates the token and inserts the binding with `now + ttl` expiry.
    async fn create_session(&self, user_id: Uuid) -> Option<Session> {
        let token = generate_session_token();
        let expires_at = Utc::now() + self.ttl;

        match sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token, user_id, expires_at
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!("create_session error: {:?}", e);
                None
            }
        }
    }

    /// destroy_session
    ///
    /// Deletes the binding. Idempotent: deleting an already-removed token reports false
    /// without erroring.
    async fn destroy_session(&self, token: &str) -> bool {
        match sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("destroy_session error: {:?}", e);
                false
            }
        }
    }

    /// purge_expired
    ///
    /// Startup sweep. Expired rows are also removed lazily on resolution, so this only
    /// clears tokens that were never presented again.
    async fn purge_expired(&self) -> u64 {
        match sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected(),
            Err(e) => {
                tracing::error!("purge_expired error: {:?}", e);
                0
            }
        }
    }
}
