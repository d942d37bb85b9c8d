use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Pages Router Module
///
/// Defines the server-rendered page surface: the dashboard page load, its form
/// action, and logout. Mirrors the shape of a page module in the frontend —
/// a load function (GET) and actions (POST) on the same path.
///
/// Access Control Strategy:
/// Every handler in this module relies on the session-resolution middleware having
/// populated the request context, and on the `PageUser`/`ActionUser` guards to
/// decide admission. The two guards branch differently off the same check: page
/// loads divert to /login with a 302, actions answer with a structured 401.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        // GET / and POST /
        // The page load produces the dashboard data for rendering; the POST is the
        // page's default form action (display-name update), the single gated write.
        .route(
            "/",
            get(handlers::get_dashboard).post(handlers::update_display_name),
        )
        // POST /logout
        // Destroys the current session and clears the cookie. Gated like any write.
        .route("/logout", post(handlers::logout))
}
