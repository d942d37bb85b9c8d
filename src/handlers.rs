use crate::{
    AppState,
    auth::{ActionError, ActionUser, PageUser, hash_password, verify_password},
    models::{
        DashboardData, LoginRequest, NewUser, RegisterRequest, UpdateDisplayNameRequest, User,
    },
    session::{clear_session_cookie, session_cookie},
};
use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;

// --- Handlers ---

/// get_dashboard
///
/// [Page Route] The protected page load (GET /). The `PageUser` guard has already
/// decided admission: a request without a resolved Identity was diverted to /login with
/// a 302 before this body ran. What remains is pure data-shaping for the frontend.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Dashboard page data", body = DashboardData),
        (status = 302, description = "No identity; diverted to /login")
    )
)]
pub async fn get_dashboard(PageUser { user, session }: PageUser) -> Json<DashboardData> {
    Json(DashboardData {
        user,
        session_expires_at: session.expires_at,
    })
}

/// update_display_name
///
/// [Action Route] The dashboard page's form action (POST /), the single gated write.
/// The `ActionUser` guard rejects identity-less requests with a structured 401 failure
/// before any write is attempted; the failure is a returned value, never an unwound
/// fault.
#[utoipa::path(
    post,
    path = "/",
    request_body = UpdateDisplayNameRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 401, description = "Authentication required"),
        (status = 422, description = "Empty display name")
    )
)]
pub async fn update_display_name(
    ActionUser { user, .. }: ActionUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateDisplayNameRequest>,
) -> Result<Json<User>, ActionError> {
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(ActionError::InvalidDisplayName);
    }

    let updated = state
        .repo
        .set_display_name(user.id, display_name.to_string())
        .await
        // The row existed moments ago when the session resolved; its absence now is a
        // storage-level surprise, not a caller mistake.
        .ok_or(ActionError::Internal)?;

    Ok(Json(updated))
}

/// register_user
///
/// [Public Route] Creates an account. The raw password is hashed immediately and only
/// the PHC string reaches the repository; a duplicate email surfaces as a 409 conflict.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = User),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, ActionError> {
    let password_hash = hash_password(&payload.password)?;

    let new_user = NewUser {
        // Emails are stored lowercased so login matching stays exact.
        email: payload.email.trim().to_lowercase(),
        display_name: payload.display_name.trim().to_string(),
        password_hash,
    };

    let created = state
        .repo
        .create_user(new_user)
        .await
        .ok_or(ActionError::EmailTaken)?;

    Ok(Json(created))
}

/// login
///
/// [Public Route] Verifies credentials, creates a session, and sets the session cookie.
/// Unknown email and wrong password produce the identical failure so the endpoint does
/// not disclose which accounts exist. The cookie's Secure attribute follows the
/// deployment environment, resolved once at startup.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = User),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<User>), ActionError> {
    let email = payload.email.trim().to_lowercase();

    let credentials = state
        .repo
        .get_credentials(&email)
        .await
        .ok_or(ActionError::InvalidCredentials)?;

    if !verify_password(&credentials.password_hash, &payload.password) {
        return Err(ActionError::InvalidCredentials);
    }

    let user = state
        .repo
        .get_user(credentials.id)
        .await
        .ok_or(ActionError::Internal)?;

    let session = state
        .sessions
        .create_session(user.id)
        .await
        .ok_or(ActionError::Internal)?;

    let jar = jar.add(session_cookie(
        &session,
        state.config.session_cookie_secure(),
    ));

    Ok((jar, Json(user)))
}

/// logout
///
/// [Action Route] Destroys the current session and instructs the browser to drop the
/// cookie. Gated like any other write: without a resolved identity there is nothing to
/// log out of, and the guard answers 401.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session destroyed; cookie cleared"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn logout(
    ActionUser { session, .. }: ActionUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ActionError> {
    state.sessions.destroy_session(&session.token).await;

    let jar = jar.remove(clear_session_cookie());

    Ok((jar, StatusCode::NO_CONTENT))
}
