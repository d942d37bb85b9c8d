use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// These are the gateway functions of the identity flow: account creation and
/// session establishment, plus the monitoring probe.
///
/// Security Mandate:
/// Nothing in this module may read or write data on behalf of an identity; the
/// only state these handlers touch is the identity store itself (registration)
/// and the session table (login).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Endpoint for new user creation. The password is hashed in the handler and
        // never stored or logged in raw form.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Verifies credentials and establishes a session. On success the session
        // cookie is set; this path is also where unauthenticated page loads are
        // diverted (the frontend renders the form at /login).
        .route("/login", post(handlers::login))
}
