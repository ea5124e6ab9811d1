use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// ConfigError
///
/// Raised while assembling `AppConfig` from the environment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// AuthError
///
/// Failure modes of the hosted auth service. `Rejected` means the service answered
/// and said no (bad credentials, expired refresh token); `Unavailable` means we never
/// got an answer at all.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("auth service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service unreachable: {0}")]
    Unavailable(String),

    #[error("unexpected auth service response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Malformed(err.to_string())
        } else {
            AuthError::Unavailable(err.to_string())
        }
    }
}

impl AuthError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }
}

/// StoreError
///
/// Wraps failures from the profile store.
#[derive(Error, Debug)]
#[error("profile store error: {0}")]
pub struct StoreError(#[from] pub sqlx::Error);

/// InitError
///
/// Startup failures while wiring the backend clients.
#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build auth client: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid database settings: {0}")]
    Database(#[from] sqlx::Error),
}

/// ApiError
///
/// Error type returned by the `/api/*` handlers. Maps onto an HTTP status and a small
/// JSON body `{ "error": "..." }`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("backend is not configured")]
    BackendUnavailable,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::Rejected { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "auth api request failed");
        }

        // Upstream rejection messages are passed through; internal details are not.
        let message = match &self {
            ApiError::Auth(AuthError::Rejected { message, .. }) => message.clone(),
            ApiError::Auth(_) | ApiError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
