use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the visitor's canonical identity record stored in the `public.users` table.
/// This is the Identity attached to a request context once the session cookie has been
/// resolved; it carries everything the page and action handlers need, and never the
/// password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key, also the FK target of sessions.user_id.
    pub id: Uuid,
    // The user's primary identifier.
    pub email: String,
    // Profile field shown on the dashboard and editable via the page action.
    pub display_name: String,
    // Coarse role marker ('member' for every self-registered account).
    pub role: String,
}

/// UserCredentials
///
/// Internal login-time projection of a `users` row: the id plus the Argon2id PHC hash.
/// Deliberately not serializable; the hash must never leave the process.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

/// NewUser
///
/// Internal insertion payload for the repository, produced by the registration handler
/// after the raw password has been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}

/// Session
///
/// A single token-to-identity binding from the `public.sessions` table. Created at login,
/// read and validated on every request, destroyed at logout or on expiry.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Session {
    // The raw cookie value. High-entropy and unguessable; the row's primary key.
    pub token: String,
    // FK to public.users.id.
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is dead from its expiry instant onward; an exact-boundary hit
    /// counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Note: The password is hashed immediately in the handler and never persisted or
/// logged in raw form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for the public login endpoint (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UpdateDisplayNameRequest
///
/// Input payload for the dashboard page's form action (POST /). The only write this
/// fragment of the application exposes, and therefore the action gated by the guard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateDisplayNameRequest {
    pub display_name: String,
}

/// --- Page Data (Output) ---

/// DashboardData
///
/// Output schema for the protected dashboard page load (GET /). The frontend renders
/// the page from this; an unauthenticated request never reaches the point where this
/// is produced.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardData {
    pub user: User,
    // Surfaced so the frontend can warn about an imminent forced logout.
    #[ts(type = "string")]
    pub session_expires_at: DateTime<Utc>,
}
