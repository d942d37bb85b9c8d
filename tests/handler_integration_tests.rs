use async_trait::async_trait;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use member_portal::{
    AppState,
    auth::{ActionError, ActionUser, hash_password},
    config::{AppConfig, Env},
    create_router, handlers,
    models::{
        DashboardData, LoginRequest, NewUser, RegisterRequest, Session,
        UpdateDisplayNameRequest, User, UserCredentials,
    },
    repository::Repository,
    session::{SESSION_COOKIE, SessionStore},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tower::ServiceExt;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// This struct is the central control point for testing handler logic.
// Handlers rely on traits, so we mock the trait implementation. Canned outputs are
// plain fields; the write counter exists so tests can prove a rejected action never
// reached the repository.
pub struct MockRepoControl {
    pub user_to_return: Option<User>,
    pub credentials_to_return: Option<UserCredentials>,
    pub created_user: Option<User>,
    pub updated_user: Option<User>,
    pub display_name_writes: AtomicUsize,
    pub last_display_name: Mutex<Option<String>>,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            user_to_return: Some(member()),
            credentials_to_return: None,
            created_user: Some(member()),
            updated_user: Some(member()),
            display_name_writes: AtomicUsize::new(0),
            last_display_name: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn get_user(&self, _id: Uuid) -> Option<User> {
        self.user_to_return.clone()
    }
    async fn get_credentials(&self, _email: &str) -> Option<UserCredentials> {
        self.credentials_to_return.clone()
    }
    async fn create_user(&self, _user: NewUser) -> Option<User> {
        self.created_user.clone()
    }
    async fn set_display_name(&self, _user_id: Uuid, display_name: String) -> Option<User> {
        self.display_name_writes.fetch_add(1, Ordering::SeqCst);
        *self.last_display_name.lock().unwrap() = Some(display_name);
        self.updated_user.clone()
    }
}

// --- MOCK SESSION STORE IMPLEMENTATION ---

// Resolution succeeds only for the configured token, which lets tests model the
// no-cookie, stale-cookie, and valid-cookie cases against the same router.
pub struct MockSessionControl {
    pub valid_token: Option<String>,
    pub user: User,
    pub session_to_create: Option<Session>,
    pub destroyed: AtomicBool,
}

impl Default for MockSessionControl {
    fn default() -> Self {
        MockSessionControl {
            valid_token: None,
            user: member(),
            session_to_create: Some(live_session(VALID_TOKEN)),
            destroyed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for MockSessionControl {
    async fn resolve_session(&self, token: &str) -> Option<(User, Session)> {
        match &self.valid_token {
            Some(valid) if valid == token => {
                Some((self.user.clone(), live_session(token)))
            }
            _ => None,
        }
    }
    async fn create_session(&self, _user_id: Uuid) -> Option<Session> {
        self.session_to_create.clone()
    }
    async fn destroy_session(&self, _token: &str) -> bool {
        self.destroyed.store(true, Ordering::SeqCst);
        true
    }
    async fn purge_expired(&self) -> u64 {
        0
    }
}

// --- TEST UTILITIES ---

const TEST_ID: Uuid = Uuid::from_u128(123);
const VALID_TOKEN: &str = "valid-session-token";

fn member() -> User {
    User {
        id: TEST_ID,
        email: "member@example.com".to_string(),
        display_name: "Member".to_string(),
        role: "member".to_string(),
    }
}

fn live_session(token: &str) -> Session {
    Session {
        token: token.to_string(),
        user_id: TEST_ID,
        expires_at: Utc::now() + Duration::hours(1),
    }
}

// Creates an AppState using mock components, keeping handles to both mocks so tests
// can assert on recorded calls after the response comes back.
fn create_test_state(
    repo: MockRepoControl,
    sessions: MockSessionControl,
    config: AppConfig,
) -> (AppState, Arc<MockRepoControl>, Arc<MockSessionControl>) {
    let repo = Arc::new(repo);
    let sessions = Arc::new(sessions);
    let state = AppState {
        repo: repo.clone(),
        sessions: sessions.clone(),
        config,
    };
    (state, repo, sessions)
}

fn get_root(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri("/");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json<T: serde::Serialize>(uri: &str, cookie: Option<&str>, payload: &T) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token));
    }
    builder
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("Failed to deserialize JSON response body")
}

// --- PAGE LOAD TESTS (the view path) ---

#[tokio::test]
async fn page_load_without_cookie_redirects_to_login() {
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let response = app.oneshot(get_root(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn page_load_with_stale_token_redirects_to_login() {
    // The store knows no valid token, so the presented cookie resolves to absent —
    // the expired-session case as the guard sees it.
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl {
            valid_token: None,
            ..MockSessionControl::default()
        },
        AppConfig::default(),
    );
    let app = create_router(state);

    let response = app.oneshot(get_root(Some("stale-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn page_load_with_valid_session_returns_dashboard() {
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl {
            valid_token: Some(VALID_TOKEN.to_string()),
            ..MockSessionControl::default()
        },
        AppConfig::default(),
    );
    let app = create_router(state);

    let response = app.oneshot(get_root(Some(VALID_TOKEN))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let data: DashboardData = body_json(response.into_body()).await;
    assert_eq!(data.user.email, "member@example.com");
}

#[tokio::test]
async fn repeated_unauthenticated_page_loads_divert_identically() {
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let first = app.clone().oneshot(get_root(None)).await.unwrap();
    let second = app.oneshot(get_root(None)).await.unwrap();

    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(second.status(), StatusCode::FOUND);
}

// --- WRITE ACTION TESTS (the action path) ---

#[tokio::test]
async fn action_without_cookie_fails_401_and_never_writes() {
    let (state, repo, _) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = UpdateDisplayNameRequest {
        display_name: "New Name".to_string(),
    };
    let response = app.oneshot(post_json("/", None, &payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(response.into_body()).await;
    assert_eq!(body["error"], "authentication required");
    // The side effect must not have happened.
    assert_eq!(repo.display_name_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn action_with_valid_session_executes() {
    let updated = User {
        display_name: "New Name".to_string(),
        ..member()
    };
    let (state, repo, _) = create_test_state(
        MockRepoControl {
            updated_user: Some(updated),
            ..MockRepoControl::default()
        },
        MockSessionControl {
            valid_token: Some(VALID_TOKEN.to_string()),
            ..MockSessionControl::default()
        },
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = UpdateDisplayNameRequest {
        display_name: "New Name".to_string(),
    };
    let response = app
        .oneshot(post_json("/", Some(VALID_TOKEN), &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(repo.display_name_writes.load(Ordering::SeqCst), 1);
    let user: User = body_json(response.into_body()).await;
    assert_eq!(user.display_name, "New Name");
}

#[tokio::test]
async fn action_with_blank_display_name_is_rejected_before_writing() {
    let (state, repo, _) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl {
            valid_token: Some(VALID_TOKEN.to_string()),
            ..MockSessionControl::default()
        },
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = UpdateDisplayNameRequest {
        display_name: "   ".to_string(),
    };
    let response = app
        .oneshot(post_json("/", Some(VALID_TOKEN), &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(repo.display_name_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn update_display_name_handler_trims_input() {
    // Direct handler call: the guard is constructed by hand so the handler's own
    // logic is the unit under test.
    let (state, repo, _) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );

    let action_user = ActionUser {
        user: member(),
        session: live_session(VALID_TOKEN),
    };
    let payload = UpdateDisplayNameRequest {
        display_name: "  Padded  ".to_string(),
    };

    let result =
        handlers::update_display_name(action_user, State(state), Json(payload)).await;

    assert!(result.is_ok());
    assert_eq!(repo.display_name_writes.load(Ordering::SeqCst), 1);
    assert_eq!(
        repo.last_display_name.lock().unwrap().as_deref(),
        Some("Padded")
    );
}

// --- LOGIN / LOGOUT TESTS ---

fn login_ready_state(
    password: &str,
    config: AppConfig,
) -> (AppState, Arc<MockRepoControl>, Arc<MockSessionControl>) {
    let password_hash = hash_password(password).expect("test hash");
    create_test_state(
        MockRepoControl {
            credentials_to_return: Some(UserCredentials {
                id: TEST_ID,
                password_hash,
            }),
            ..MockRepoControl::default()
        },
        MockSessionControl::default(),
        config,
    )
}

#[tokio::test]
async fn login_with_valid_credentials_sets_session_cookie() {
    let (state, ..) = login_ready_state("correct horse", AppConfig::default());
    let app = create_router(state);

    let payload = LoginRequest {
        email: "member@example.com".to_string(),
        password: "correct horse".to_string(),
    };
    let response = app.oneshot(post_json("/login", None, &payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("login must set the session cookie");
    assert!(set_cookie.starts_with(&format!("{}={}", SESSION_COOKIE, VALID_TOKEN)));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    // Local environment: cookies must work over plain HTTP.
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn login_cookie_is_secure_only_in_production() {
    let config = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };
    let (state, ..) = login_ready_state("correct horse", config);
    let app = create_router(state);

    let payload = LoginRequest {
        email: "member@example.com".to_string(),
        password: "correct horse".to_string(),
    };
    let response = app.oneshot(post_json("/login", None, &payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.contains("Secure"));
}

#[tokio::test]
async fn login_with_wrong_password_fails_401_without_cookie() {
    let (state, ..) = login_ready_state("correct horse", AppConfig::default());
    let app = create_router(state);

    let payload = LoginRequest {
        email: "member@example.com".to_string(),
        password: "wrong horse".to_string(),
    };
    let response = app.oneshot(post_json("/login", None, &payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn login_with_unknown_email_fails_like_wrong_password() {
    // credentials_to_return: None — the account does not exist. The status and body
    // must be indistinguishable from the wrong-password case.
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = LoginRequest {
        email: "nobody@example.com".to_string(),
        password: "whatever".to_string(),
    };
    let response = app.oneshot(post_json("/login", None, &payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(response.into_body()).await;
    assert_eq!(body["error"], ActionError::InvalidCredentials.to_string());
}

#[tokio::test]
async fn logout_destroys_session_and_clears_cookie() {
    let (state, _, sessions) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl {
            valid_token: Some(VALID_TOKEN.to_string()),
            ..MockSessionControl::default()
        },
        AppConfig::default(),
    );
    let app = create_router(state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/logout")
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, VALID_TOKEN))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(sessions.destroyed.load(Ordering::SeqCst));

    // The response instructs the browser to drop the cookie.
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("logout must clear the session cookie");
    assert!(set_cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn logout_without_session_fails_401() {
    let (state, _, sessions) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/logout")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!sessions.destroyed.load(Ordering::SeqCst));
}

// --- REGISTRATION TESTS ---

#[tokio::test]
async fn register_creates_user() {
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = RegisterRequest {
        email: "Member@Example.com".to_string(),
        display_name: "Member".to_string(),
        password: "correct horse".to_string(),
    };
    let response = app
        .oneshot(post_json("/register", None, &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let user: User = body_json(response.into_body()).await;
    assert_eq!(user.id, TEST_ID);
}

#[tokio::test]
async fn register_with_taken_email_conflicts() {
    let (state, ..) = create_test_state(
        MockRepoControl {
            created_user: None,
            ..MockRepoControl::default()
        },
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let payload = RegisterRequest {
        email: "member@example.com".to_string(),
        display_name: "Member".to_string(),
        password: "correct horse".to_string(),
    };
    let response = app
        .oneshot(post_json("/register", None, &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// --- MISC ---

#[tokio::test]
async fn health_check_is_public() {
    let (state, ..) = create_test_state(
        MockRepoControl::default(),
        MockSessionControl::default(),
        AppConfig::default(),
    );
    let app = create_router(state);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
