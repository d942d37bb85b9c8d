use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use thiserror::Error;

use crate::{
    AppState,
    models::{Session, User},
    session::SESSION_COOKIE,
};
use axum_extra::extract::cookie::CookieJar;

/// Fixed unauthenticated entry point. Page loads without an identity are diverted here;
/// the frontend owns rendering the route.
pub const LOGIN_PATH: &str = "/login";

/// RequestAuth
///
/// The per-request context: at most one Identity and one Session, resolved exactly once
/// by `resolve_session` before any guard executes, and discarded with the request.
/// Both fields are populated together or not at all.
#[derive(Debug, Clone, Default)]
pub struct RequestAuth {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// resolve_session
///
/// Middleware that consults the Session Store once per request and attaches the outcome
/// to the request extensions. It never rejects: absence of an identity is recorded, and
/// the per-route guards decide what that absence means (redirect for page loads, 401 for
/// actions). Store-internal failures have already been normalized to absence by the time
/// this runs.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.resolve_session(cookie.value()).await,
        None => None,
    };

    let auth = match resolved {
        Some((user, session)) => RequestAuth {
            user: Some(user),
            session: Some(session),
        },
        None => RequestAuth::default(),
    };

    request.extensions_mut().insert(auth);
    next.run(request).await
}

/// LoginRedirect
///
/// The page-view outcome for an absent identity: a 302 diversion to the login route.
/// Not an error from the framework's point of view, but it short-circuits all further
/// processing of the request.
#[derive(Debug)]
pub struct LoginRedirect;

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        // axum's Redirect helpers emit 303/307; the contract here is a plain 302.
        (StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response()
    }
}

/// ActionError
///
/// Structured failure values for write actions, returned (never thrown) from handlers.
/// Each variant maps to the HTTP status the caller needs to render an appropriate
/// response; bodies carry the human-readable message as JSON.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    /// A write action was invoked without a resolved identity.
    #[error("authentication required")]
    AuthenticationRequired,
    /// Login with an unknown email or a wrong password. Deliberately a single variant:
    /// the response must not disclose which accounts exist.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already registered")]
    EmailTaken,
    #[error("display name must not be empty")]
    InvalidDisplayName,
    /// Hashing or storage faults. The cause is logged where it occurred; the body stays
    /// generic.
    #[error("internal error")]
    Internal,
}

impl ActionError {
    fn status(&self) -> StatusCode {
        match self {
            ActionError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ActionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ActionError::EmailTaken => StatusCode::CONFLICT,
            ActionError::InvalidDisplayName => StatusCode::UNPROCESSABLE_ENTITY,
            ActionError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// PageUser
///
/// Access guard for page loads. Usable as a handler argument on any page route; if the
/// request context carries no Identity, extraction rejects with `LoginRedirect` and the
/// handler never runs. The decision is pure: it only reads the context the middleware
/// attached, so extracting twice from the same request yields the same outcome.
#[derive(Debug, Clone)]
pub struct PageUser {
    pub user: User,
    pub session: Session,
}

impl<S> FromRequestParts<S> for PageUser
where
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestAuth>() {
            Some(RequestAuth {
                user: Some(user),
                session: Some(session),
            }) => Ok(PageUser {
                user: user.clone(),
                session: session.clone(),
            }),
            _ => Err(LoginRedirect),
        }
    }
}

/// ActionUser
///
/// Access guard for write actions. Same boolean check as `PageUser`, different outcome
/// type: an absent identity rejects with a structured 401 failure, because the action
/// dispatcher needs a machine-readable error where the page renderer needs a diversion.
#[derive(Debug, Clone)]
pub struct ActionUser {
    pub user: User,
    pub session: Session,
}

impl<S> FromRequestParts<S> for ActionUser
where
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestAuth>() {
            Some(RequestAuth {
                user: Some(user),
                session: Some(session),
            }) => Ok(ActionUser {
                user: user.clone(),
                session: session.clone(),
            }),
            _ => Err(ActionError::AuthenticationRequired),
        }
    }
}

// --- Password Handling ---

/// hash_password
///
/// Argon2id with default parameters and a fresh 16-byte salt from the OS RNG, encoded
/// as a PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, ActionError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| {
        tracing::error!("salt generation failed: {:?}", e);
        ActionError::Internal
    })?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
        tracing::error!("salt encoding failed: {:?}", e);
        ActionError::Internal
    })?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {:?}", e);
            ActionError::Internal
        })
}

/// verify_password
///
/// Checks a candidate password against a stored PHC string. An unparseable stored hash
/// counts as a failed verification rather than an error.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
