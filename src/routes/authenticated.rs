use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// API routes that need a resolved identity. The gate already redirects anonymous
/// requests for these paths; the `require_session` route layer applied in
/// `create_router` is the second line for when the gate runs fail-open.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        // Profile summary for the signed-in user, including the verification flag.
        .route("/api/me", get(handlers::get_me))
}
