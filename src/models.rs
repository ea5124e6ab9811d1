use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// SessionUser
///
/// The identity resolved for one request from its session cookies. Never persisted;
/// lives for the duration of the request (stored in request extensions by the gate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// AuthServiceUser
///
/// User object as returned by the hosted auth service (`/auth/v1/user`, token grants).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthServiceUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl From<AuthServiceUser> for SessionUser {
    fn from(user: AuthServiceUser) -> Self {
        SessionUser {
            id: user.id,
            email: user.email,
        }
    }
}

/// SessionTokens
///
/// A freshly issued token pair, from either a password grant or a refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: AuthServiceUser,
}

/// SignUpResult
///
/// Sign-up either issues a session right away (auto-confirm projects) or only creates
/// the user and sends a confirmation email.
#[derive(Debug, Clone)]
pub struct SignUpResult {
    pub user: AuthServiceUser,
    pub session: Option<SessionTokens>,
}

// --- Request Payloads ---

/// CredentialsRequest
///
/// Body for `POST /api/auth/signup` and `POST /api/auth/login`.
/// The password is forwarded to the auth service and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CredentialsRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
}

/// EmailRequest
///
/// Body for the email-only flows (resend verification, forgot password).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EmailRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
}

/// ResetPasswordRequest
///
/// Body for `POST /api/auth/reset-password`; applies to the current session's user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// VerifyEmailQuery
///
/// Query string of the link embedded in confirmation emails.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct VerifyEmailQuery {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// --- Responses ---

/// SessionResponse
///
/// Returned by login, sign-up and `GET /api/auth/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub user: SessionUser,
    /// False when sign-up is waiting on email confirmation and no session was issued.
    pub signed_in: bool,
}

/// MeResponse
///
/// Profile summary for the signed-in user (`GET /api/me`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: Option<String>,
    /// `null` when the profile row is missing or its flag was never set.
    pub email_verified: Option<bool>,
}
