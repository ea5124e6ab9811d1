use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    error::AuthError,
    models::{AuthServiceUser, SessionTokens, SignUpResult},
};

/// AuthProvider
///
/// Contract for the hosted auth service. The gate only needs `get_user` and
/// `refresh_session`; the rest back the `/api/auth` endpoints.
///
/// `SupabaseAuthClient` talks to the real service; `MockAuthProvider` is used in tests.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Validates an access token and returns its user.
    async fn get_user(&self, access_token: &str) -> Result<AuthServiceUser, AuthError>;

    /// Exchanges a refresh token for a new token pair.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpResult, AuthError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, AuthError>;

    /// Revokes the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Re-sends the sign-up confirmation email.
    async fn resend_verification(&self, email: &str, redirect_to: &str)
    -> Result<(), AuthError>;

    async fn recover_password(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), AuthError>;

    /// Redeems the `token_hash` from a confirmation link.
    async fn verify_otp(&self, token_hash: &str, kind: &str) -> Result<SessionTokens, AuthError>;
}

/// AuthProviderState
///
/// The concrete type used to share the auth service client across the application state.
pub type AuthProviderState = Arc<dyn AuthProvider>;

/// SupabaseAuthClient
///
/// reqwest-backed client for the `/auth/v1` API. Every request carries the anon key
/// in the `apikey` header; user-scoped requests add the access token as a bearer.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

/// failure_for_status
///
/// Only statuses that say something about the credentials count as a rejection.
/// Rate limiting and server errors mean the service could not answer, and must not
/// end a session.
fn failure_for_status(status: u16, message: String) -> AuthError {
    match status {
        400 | 401 | 403 | 404 | 422 => AuthError::Rejected { status, message },
        _ => AuthError::Unavailable(format!("status {status}: {message}")),
    }
}

impl SupabaseAuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, AuthError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body
                .msg
                .or(body.error_description)
                .or(body.message)
                .unwrap_or_else(|| "request rejected".to_string()),
            Err(_) => "request rejected".to_string(),
        };
        Err(failure_for_status(status, message))
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, AuthError> {
        let response = Self::send(builder).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn get_user(&self, access_token: &str) -> Result<AuthServiceUser, AuthError> {
        Self::send_json(
            self.request(reqwest::Method::GET, "/user")
                .bearer_auth(access_token),
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        Self::send_json(
            self.request(reqwest::Method::POST, "/token")
                .query(&[("grant_type", "refresh_token")])
                .json(&serde_json::json!({ "refresh_token": refresh_token })),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpResult, AuthError> {
        let body: serde_json::Value = Self::send_json(
            self.request(reqwest::Method::POST, "/signup")
                .query(&[("redirect_to", redirect_to)])
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await?;

        // With auto-confirm the service answers with a full session; otherwise the
        // body is the bare user object.
        if body.get("access_token").is_some() {
            let session: SessionTokens = serde_json::from_value(body)
                .map_err(|e| AuthError::Malformed(e.to_string()))?;
            Ok(SignUpResult {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user: AuthServiceUser =
                serde_json::from_value(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
            Ok(SignUpResult {
                user,
                session: None,
            })
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, AuthError> {
        Self::send_json(
            self.request(reqwest::Method::POST, "/token")
                .query(&[("grant_type", "password")])
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        Self::send(
            self.request(reqwest::Method::POST, "/logout")
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn resend_verification(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        Self::send(
            self.request(reqwest::Method::POST, "/resend")
                .query(&[("redirect_to", redirect_to)])
                .json(&serde_json::json!({ "type": "signup", "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn recover_password(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        Self::send(
            self.request(reqwest::Method::POST, "/recover")
                .query(&[("redirect_to", redirect_to)])
                .json(&serde_json::json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), AuthError> {
        Self::send(
            self.request(reqwest::Method::PUT, "/user")
                .bearer_auth(access_token)
                .json(&serde_json::json!({ "password": password })),
        )
        .await?;
        Ok(())
    }

    async fn verify_otp(&self, token_hash: &str, kind: &str) -> Result<SessionTokens, AuthError> {
        Self::send_json(
            self.request(reqwest::Method::POST, "/verify")
                .json(&serde_json::json!({ "type": kind, "token_hash": token_hash })),
        )
        .await
    }
}

// --- Mock Implementation (tests) ---

/// MockAuthProvider
///
/// In-memory stand-in for the auth service. Tokens and accounts are registered up
/// front; every call is recorded in `calls` so tests can assert which upstream
/// requests were (or were not) made.
#[derive(Default)]
pub struct MockAuthProvider {
    /// access token -> user
    pub access_tokens: HashMap<String, AuthServiceUser>,
    /// refresh token -> freshly issued pair
    pub refresh_tokens: HashMap<String, SessionTokens>,
    /// email -> (password, issued pair)
    pub accounts: HashMap<String, (String, SessionTokens)>,
    /// token_hash -> issued pair
    pub otp_tokens: HashMap<String, SessionTokens>,
    /// When true every call fails as if the service could not be reached.
    pub unavailable: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, token: &str, user: AuthServiceUser) -> Self {
        self.access_tokens.insert(token.to_string(), user);
        self
    }

    pub fn with_refresh_token(mut self, token: &str, issued: SessionTokens) -> Self {
        self.refresh_tokens.insert(token.to_string(), issued);
        self
    }

    pub fn with_account(mut self, email: &str, password: &str, issued: SessionTokens) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), issued));
        self
    }

    pub fn with_otp(mut self, token_hash: &str, issued: SessionTokens) -> Self {
        self.otp_tokens.insert(token_hash.to_string(), issued);
        self
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: &str) -> Result<(), AuthError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
        if self.unavailable {
            return Err(AuthError::Unavailable("mock: connection refused".to_string()));
        }
        Ok(())
    }

    fn rejected(message: &str) -> AuthError {
        AuthError::Rejected {
            status: 401,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_user(&self, access_token: &str) -> Result<AuthServiceUser, AuthError> {
        self.record("get_user")?;
        self.access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| Self::rejected("invalid JWT"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        self.record("refresh_session")?;
        self.refresh_tokens
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| Self::rejected("Invalid Refresh Token"))
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _redirect_to: &str,
    ) -> Result<SignUpResult, AuthError> {
        self.record("sign_up")?;
        if self.accounts.contains_key(email) {
            return Err(AuthError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        Ok(SignUpResult {
            user: AuthServiceUser {
                id: uuid::Uuid::new_v4(),
                email: Some(email.to_string()),
                email_confirmed_at: None,
            },
            session: None,
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, AuthError> {
        self.record("sign_in_with_password")?;
        match self.accounts.get(email) {
            Some((expected, issued)) if expected == password => Ok(issued.clone()),
            _ => Err(AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.record("sign_out")
    }

    async fn resend_verification(
        &self,
        _email: &str,
        _redirect_to: &str,
    ) -> Result<(), AuthError> {
        self.record("resend_verification")
    }

    async fn recover_password(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        self.record("recover_password")
    }

    async fn update_password(&self, access_token: &str, _password: &str) -> Result<(), AuthError> {
        self.record("update_password")?;
        if self.access_tokens.contains_key(access_token) {
            Ok(())
        } else {
            Err(Self::rejected("invalid JWT"))
        }
    }

    async fn verify_otp(&self, token_hash: &str, _kind: &str) -> Result<SessionTokens, AuthError> {
        self.record("verify_otp")?;
        self.otp_tokens
            .get(token_hash)
            .cloned()
            .ok_or_else(|| Self::rejected("Token has expired or is invalid"))
    }
}
