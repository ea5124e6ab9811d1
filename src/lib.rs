use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod supabase;

// API routers (public / authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::{AppConfig, BackendConfig};
pub use gate::{Gate, Outcome, classifier::RouteTable};
pub use repository::{MockProfileRepository, PostgresProfileRepository, ProfileState};
pub use session::SessionResolver;
pub use supabase::{AuthProviderState, MockAuthProvider, SupabaseAuthClient};

use error::InitError;

/// ApiDoc
///
/// OpenAPI description of the auth API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup, handlers::login, handlers::logout, handlers::resend_verification,
        handlers::forgot_password, handlers::reset_password, handlers::session,
        handlers::verify_email, handlers::get_me
    ),
    components(
        schemas(
            models::SessionUser, models::CredentialsRequest, models::EmailRequest,
            models::ResetPasswordRequest, models::SessionResponse, models::MeResponse,
        )
    ),
    tags(
        (name = "nutrigate", description = "Access gate and auth API")
    )
)]
struct ApiDoc;

/// Backend
///
/// Everything that talks to the hosted backend. Absent when the backend settings are
/// missing, in which case the gate fails open and the auth API answers 503.
#[derive(Clone)]
pub struct Backend {
    pub auth: AuthProviderState,
    pub profiles: ProfileState,
    pub sessions: SessionResolver,
    pub gate: Gate,
}

impl Backend {
    /// Assembles the backend from already-built collaborators.
    pub fn new(
        auth: AuthProviderState,
        profiles: ProfileState,
        routes: Arc<RouteTable>,
        jwt_secret: Option<&str>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            sessions: SessionResolver::new(auth.clone(), jwt_secret, secure_cookies),
            gate: Gate::new(routes, profiles.clone()),
            auth,
            profiles,
        }
    }

    /// connect
    ///
    /// Builds the real clients from configuration. The Postgres pool connects lazily,
    /// so an unreachable database shows up as failed lookups, not a failed startup.
    pub fn connect(
        settings: &BackendConfig,
        routes: Arc<RouteTable>,
        secure_cookies: bool,
    ) -> Result<Self, InitError> {
        let auth = Arc::new(SupabaseAuthClient::new(
            &settings.supabase_url,
            &settings.anon_key,
        )?) as AuthProviderState;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&settings.db_url)?;
        let profiles = Arc::new(PostgresProfileRepository::new(pool)) as ProfileState;

        Ok(Self::new(
            auth,
            profiles,
            routes,
            settings.jwt_secret.as_deref(),
            secure_cookies,
        ))
    }
}

/// AppState
///
/// Shared, immutable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Backend Layer: auth service client, profile store and the gate built on them.
    /// `None` when the backend settings are missing and the gate runs fail-open.
    pub backend: Option<Backend>,
    /// Route Table: static/public/protected classification, shared with the gate.
    pub routes: Arc<RouteTable>,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// State with the gate disabled (no backend).
    pub fn without_backend(config: AppConfig) -> Self {
        Self {
            backend: None,
            routes: Arc::new(RouteTable::default()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RouteTable> {
    fn from_ref(app_state: &AppState) -> Arc<RouteTable> {
        app_state.routes.clone()
    }
}

/// require_session
///
/// Route layer for `authenticated_routes`: the `AuthUser` extractor rejects with 401
/// when the gate left no identity on the request.
async fn require_session(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the API routers, the static bundle fallback, the access gate and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Static Bundle
    // Single-page app: unknown paths get index.html and the client router takes over.
    let static_dir = state.config.static_dir.clone();
    let spa = ServeDir::new(&static_dir)
        .fallback(ServeFile::new(format!("{}/index.html", static_dir)));

    // 3. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI (a protected path for the gate).
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: auth API, verification link, health.
        .merge(public::public_routes())
        // Authenticated Routes: `require_session` answers 401 when the gate left no identity.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn(require_session)),
        )
        // Pages: everything else is served from the web bundle.
        .fallback_service(spa)
        // 4. Access Gate: wraps every route and the fallback.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::middleware::gate_layer,
        ))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 5. Observability and Correlation Layers (Applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 5a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 5b. Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 5c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 6. CORS Layer (Applied last)
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, URI and the `x-request-id` so every log line of
/// one request (gate decision included) can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
