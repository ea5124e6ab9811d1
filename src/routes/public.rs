use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Everything here sits in a public zone of
/// the gate's route table (`/health`, `/api/auth/*`, `/verify-email`), so the gate
/// lets anonymous requests through while still resolving the session when there is one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Auth API (forwards to the hosted auth service) ---
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route(
            "/api/auth/resend-verification",
            post(handlers::resend_verification),
        )
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/auth/reset-password", post(handlers::reset_password))
        .route("/api/auth/session", get(handlers::session))
        // GET /verify-email?token_hash=...&type=...
        // Landing point of confirmation and recovery emails.
        .route("/verify-email", get(handlers::verify_email))
}
