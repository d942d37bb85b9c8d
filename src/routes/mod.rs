/// Router Module Index
///
/// Organizes the application's routing logic into access-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via the guard
/// extractors), preventing accidental exposure of protected endpoints.
///
/// The two modules map directly to the two sides of the access guard.

/// Routes accessible to all clients (anonymous or logged-in): health, registration,
/// and login.
pub mod public;

/// The session-gated page and its actions. Every handler here carries a `PageUser`
/// or `ActionUser` guard; the session-resolution middleware has populated the
/// request context before these run.
pub mod pages;
