//! Session resolution from request cookies.
//!
//! The hosted auth service owns session truth. This module reads the two session
//! cookies, asks the service (or verifies locally when a JWT secret is configured)
//! whether the access token is still good, and refreshes the pair when it is not.
//! Refreshing rotates both cookies; the caller must echo `SessionResolution::cookies`
//! on whatever response it finally returns.

use axum::http::{HeaderMap, HeaderValue, header};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AuthError,
    models::{SessionTokens, SessionUser},
    supabase::AuthProviderState,
};

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

// Refresh tokens outlive access tokens; the service decides when they actually expire.
const REFRESH_COOKIE_MAX_AGE: u64 = 60 * 60 * 24 * 30;

/// AccessClaims
///
/// The subset of the access-token payload we rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    pub aud: String,
}

/// SessionResolution
///
/// Result of resolving one request. `cookies` holds `Set-Cookie` values to attach to
/// the outgoing response (rotated tokens, or clearing cookies for a dead session).
#[derive(Debug, Clone, Default)]
pub struct SessionResolution {
    pub user: Option<SessionUser>,
    /// Access token that is valid for the rest of this request (rotated if refreshed).
    pub access_token: Option<String>,
    pub cookies: Vec<HeaderValue>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

enum AccessCheck {
    Valid(SessionUser),
    // Expired, revoked or otherwise unusable; try the refresh token.
    Stale,
}

/// SessionResolver
///
/// Shared, cheap to clone. One `resolve` call per request, at most one access check
/// and one refresh round trip.
#[derive(Clone)]
pub struct SessionResolver {
    auth: AuthProviderState,
    decoding_key: Option<DecodingKey>,
    secure_cookies: bool,
}

impl SessionResolver {
    pub fn new(auth: AuthProviderState, jwt_secret: Option<&str>, secure_cookies: bool) -> Self {
        Self {
            auth,
            decoding_key: jwt_secret.map(|secret| DecodingKey::from_secret(secret.as_bytes())),
            secure_cookies,
        }
    }

    /// resolve
    ///
    /// Returns `Err` only when the auth service could not be consulted at all.
    /// A missing, expired or revoked session is `Ok` with `user: None`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<SessionResolution, AuthError> {
        let access = read_cookie(headers, ACCESS_COOKIE);
        let refresh = read_cookie(headers, REFRESH_COOKIE);

        if access.is_none() && refresh.is_none() {
            return Ok(SessionResolution::anonymous());
        }

        if let Some(access) = access.as_deref() {
            if let AccessCheck::Valid(user) = self.check_access(access).await? {
                return Ok(SessionResolution {
                    user: Some(user),
                    access_token: Some(access.to_string()),
                    cookies: Vec::new(),
                });
            }
        }

        let Some(refresh) = refresh else {
            return Ok(SessionResolution {
                cookies: clear_session_cookies(self.secure_cookies),
                ..SessionResolution::anonymous()
            });
        };

        match self.auth.refresh_session(&refresh).await {
            Ok(tokens) => {
                tracing::debug!(user_id = %tokens.user.id, "session refreshed");
                Ok(SessionResolution {
                    cookies: session_cookies(&tokens, self.secure_cookies),
                    access_token: Some(tokens.access_token),
                    user: Some(tokens.user.into()),
                })
            }
            Err(err) if err.is_rejection() => {
                tracing::debug!(error = %err, "refresh token rejected, clearing session");
                Ok(SessionResolution {
                    cookies: clear_session_cookies(self.secure_cookies),
                    ..SessionResolution::anonymous()
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn check_access(&self, token: &str) -> Result<AccessCheck, AuthError> {
        if let Some(key) = &self.decoding_key {
            let mut validation = Validation::default();
            validation.validate_exp = true;
            validation.set_audience(&["authenticated"]);

            return Ok(match decode::<AccessClaims>(token, key, &validation) {
                Ok(data) => AccessCheck::Valid(SessionUser {
                    id: data.claims.sub,
                    email: data.claims.email,
                }),
                Err(e) => {
                    match e.kind() {
                        ErrorKind::ExpiredSignature => tracing::debug!("access token expired"),
                        _ => tracing::debug!(error = %e, "access token rejected"),
                    }
                    AccessCheck::Stale
                }
            });
        }

        match self.auth.get_user(token).await {
            Ok(user) => Ok(AccessCheck::Valid(user.into())),
            Err(err) if err.is_rejection() => Ok(AccessCheck::Stale),
            Err(err) => Err(err),
        }
    }
}

/// read_cookie
///
/// Finds `name` across all `Cookie` headers. Empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// session_cookies
///
/// `Set-Cookie` values carrying a freshly issued token pair.
pub fn session_cookies(tokens: &SessionTokens, secure: bool) -> Vec<HeaderValue> {
    [
        build_cookie(ACCESS_COOKIE, &tokens.access_token, tokens.expires_in, secure),
        build_cookie(
            REFRESH_COOKIE,
            &tokens.refresh_token,
            REFRESH_COOKIE_MAX_AGE,
            secure,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// clear_session_cookies
///
/// `Set-Cookie` values that expire both session cookies immediately.
pub fn clear_session_cookies(secure: bool) -> Vec<HeaderValue> {
    [
        build_cookie(ACCESS_COOKIE, "", 0, secure),
        build_cookie(REFRESH_COOKIE, "", 0, secure),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn build_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    match HeaderValue::from_str(&cookie) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(cookie = name, "token is not a valid cookie value, dropping");
            None
        }
    }
}
