use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

use crate::{
    models::SessionUser,
    session::{ACCESS_COOKIE, read_cookie},
};

/// AccessToken
///
/// Request extension set by the gate: the access token that is valid for this request,
/// already rotated when the session was refreshed on the way in.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

impl AccessToken {
    /// Gate-provided token first, then the raw cookie (gate disabled or skipped).
    pub fn from_parts(parts: &Parts) -> Option<String> {
        parts
            .extensions
            .get::<AccessToken>()
            .map(|token| token.0.clone())
            .or_else(|| read_cookie(&parts.headers, ACCESS_COOKIE))
    }
}

impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AccessToken::from_parts(parts)
            .map(AccessToken)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// MaybeAccessToken
///
/// Non-rejecting variant of `AccessToken`, for logout.
#[derive(Debug, Clone)]
pub struct MaybeAccessToken(pub Option<String>);

impl<S> FromRequestParts<S> for MaybeAccessToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAccessToken(AccessToken::from_parts(parts)))
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request, for use as a handler argument.
///
/// The gate has already validated (and possibly refreshed) the session and stored the
/// `SessionUser` in the request extensions; this extractor just reads it back.
/// Rejection: 401 when the gate left no identity, which happens when it ran
/// fail-open or the route sits outside the gated tree.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<SessionUser>()
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: user.id,
            email: user.email.clone(),
        })
    }
}

/// MaybeAuthUser
///
/// Like `AuthUser` but never rejects; for public endpoints that behave differently
/// when a session exists.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<SessionUser>().cloned()))
    }
}
