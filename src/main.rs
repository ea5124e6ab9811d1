use nutrigate::{
    AppState, Backend, BackendConfig, RouteTable,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point. Initializes, in order: Configuration, Logging, the
/// Backend clients (auth service and Postgres) and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading
    // Loads .env file settings before configuration can be read.
    // AppConfig::load() only fails on invalid values, or on missing backend
    // settings when GATE_FAIL_OPEN=false.
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG takes priority; otherwise debug for this crate, info for the HTTP stack.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nutrigate=debug,tower_http=info,axum=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Backend Initialization (auth service client + lazy Postgres pool)
    // Missing settings were already tolerated by load() when fail-open is on;
    // report why here, now that logging is up.
    let routes = Arc::new(RouteTable::default());
    let backend = match &config.backend {
        Some(settings) => Some(
            Backend::connect(settings, routes.clone(), config.secure_cookies())
                .expect("FATAL: failed to initialise backend clients"),
        ),
        None => {
            if let Err(e) = BackendConfig::from_env() {
                tracing::error!(error = %e, "backend not configured, access gate disabled (fail-open)");
            }
            None
        }
    };

    // 5. Unified State Assembly
    let app_state = AppState {
        backend,
        routes,
        config: config.clone(),
    };

    // 6. Router Assembly
    let app = create_router(app_state);

    // 7. Server Startup
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!("Serving web bundle from {}", config.static_dir);

    axum::serve(listener, app).await.expect("server error");
}
