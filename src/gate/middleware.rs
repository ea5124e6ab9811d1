use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::classifier::Category;
use crate::{AppState, auth::AccessToken};

/// gate_layer
///
/// Runs in front of every route, including the static fallback.
///
/// Order matters: the static check happens before any network call, session
/// resolution happens before the path rules are applied, and the cookies produced
/// by session resolution are attached to whichever response goes out (redirect or
/// the inner service's response, unless that response sets cookies itself).
///
/// Fail-open cases: no backend configured, or the auth service unreachable. Both are
/// logged and the request continues without an identity.
pub async fn gate_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    if state.routes.classify(&path) == Category::StaticAsset {
        return next.run(request).await;
    }

    let Some(backend) = state.backend.as_ref() else {
        tracing::debug!(%path, "gate disabled, passing through");
        return next.run(request).await;
    };

    let resolution = match backend.sessions.resolve(request.headers()).await {
        Ok(resolution) => resolution,
        Err(err) => {
            tracing::error!(%path, error = %err, "session resolution failed, failing open");
            return next.run(request).await;
        }
    };

    let outcome = backend.gate.evaluate(resolution.user.as_ref(), &path).await;
    tracing::debug!(
        %path,
        ?outcome,
        authenticated = resolution.user.is_some(),
        "gate decision"
    );

    let mut response = match outcome.location(&state.config.app_home) {
        Some(location) => redirect(&location),
        None => {
            if let Some(user) = resolution.user {
                request.extensions_mut().insert(user);
            }
            if let Some(token) = resolution.access_token {
                request.extensions_mut().insert(AccessToken(token));
            }
            next.run(request).await
        }
    };

    // A handler that set its own session cookies (login, logout, verify) has the
    // final say; appending ours would override them in the browser.
    if !response.headers().contains_key(header::SET_COOKIE) {
        for cookie in resolution.cookies {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// 302 with a `Location` header.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(%location, "redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
