use member_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PgRepository, RepositoryState},
    session::{PgSessionStore, SessionStoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, Database, Session Store, and the HTTP
/// Server — and for the matching teardown on shutdown. All services are constructed
/// here and dependency-injected into the state; nothing authenticates through a
/// module-level global.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Sets the default log level. It prioritizes the RUST_LOG environment variable,
    // falling back to sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "member_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment (Production Observability)
    // The structured logging format is dynamically selected based on the APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    // Creates a connection pool to the Postgres instance defined in the configuration.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // 5. Service Construction (Dependency Injection)
    // The repository and the session-authentication adapter share the pool and are
    // wrapped in Arcs for thread-safe sharing across requests.
    let repo = Arc::new(PgRepository::new(pool.clone())) as RepositoryState;
    let sessions = Arc::new(PgSessionStore::new(pool.clone(), config.session_ttl_hours))
        as SessionStoreState;

    // Startup sweep: clear session rows that expired while the process was down.
    let purged = sessions.purge_expired().await;
    if purged > 0 {
        tracing::info!("purged {} expired sessions", purged);
    }

    // 6. Unified State Assembly
    // Bundles all initialized dependencies into the shared AppState.
    let app_state = AppState {
        repo,
        sessions,
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("FATAL: Failed to bind 0.0.0.0:3000");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    // The long-running Axum server process, with an explicit teardown boundary:
    // SIGINT stops accepting connections, then the pool is drained before exit.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: HTTP server terminated abnormally");

    pool.close().await;
    tracing::info!("Connection pool closed. Bye.");
}

/// shutdown_signal
///
/// Resolves when the process receives Ctrl-C / SIGINT, handing axum the cue to finish
/// in-flight requests and stop.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("FATAL: Failed to install Ctrl-C handler");
}
