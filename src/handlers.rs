use crate::{
    AppState, Backend,
    auth::{AccessToken, AuthUser, MaybeAccessToken, MaybeAuthUser},
    error::ApiError,
    gate::{VERIFY_PATH, middleware::redirect},
    models::{
        AuthServiceUser, CredentialsRequest, EmailRequest, MeResponse, ResetPasswordRequest,
        SessionResponse, SessionUser, VerifyEmailQuery,
    },
    repository::VerificationLookup,
    session::{clear_session_cookies, session_cookies},
};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
};

const MIN_PASSWORD_LEN: usize = 6;
const RESET_PASSWORD_PATH: &str = "/reset-password";

// Link types the auth service issues for `/verify-email`.
const OTP_KINDS: &[&str] = &["signup", "email", "recovery", "invite", "magiclink", "email_change"];

// --- Helpers ---

fn backend(state: &AppState) -> Result<&Backend, ApiError> {
    state.backend.as_ref().ok_or(ApiError::BackendUnavailable)
}

fn set_cookies(cookies: Vec<HeaderValue>) -> AppendHeaders<Vec<(HeaderName, HeaderValue)>> {
    AppendHeaders(
        cookies
            .into_iter()
            .map(|cookie| (header::SET_COOKIE, cookie))
            .collect(),
    )
}

fn validate_email(email: &str) -> Result<&str, ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::BadRequest("a valid email address is required".to_string())),
    }
}

fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password)
}

/// Keeps the profile flag in step with what the auth service already knows.
/// Best-effort: a failed write only delays the gate noticing the confirmation.
async fn sync_verified_flag(backend: &Backend, user: &AuthServiceUser) {
    if user.email_confirmed_at.is_none() {
        return;
    }
    if let Err(e) = backend.profiles.mark_email_verified(user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "failed to sync email_verified flag");
    }
}

// --- Handlers ---

/// signup
///
/// [Public Route] Creates the account with the auth service, then the mirror row in
/// `profiles` with `email_verified = false`. The confirmation email links back to
/// `/verify-email`. Projects with auto-confirm enabled get a session right away.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid input or rejected by the auth service"),
        (status = 503, description = "Backend not configured")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let backend = backend(&state)?;
    let email = validate_email(&payload.email)?;
    let password = validate_password(&payload.password)?;

    let redirect_to = format!("{}/verify-email", state.config.site_url);
    let result = backend.auth.sign_up(email, password, &redirect_to).await?;

    // The account already exists upstream at this point. A missing profile row
    // does not block the gate and is created again by the verification link.
    if let Err(e) = backend.profiles.create_profile(result.user.id, email).await {
        tracing::warn!(user_id = %result.user.id, error = %e, "failed to create profile row");
    }
    sync_verified_flag(backend, &result.user).await;

    tracing::info!(user_id = %result.user.id, "account created");

    let cookies = match &result.session {
        Some(tokens) => session_cookies(tokens, state.config.secure_cookies()),
        None => Vec::new(),
    };
    let body = SessionResponse {
        user: SessionUser::from(result.user),
        signed_in: result.session.is_some(),
    };
    Ok((set_cookies(cookies), Json(body)).into_response())
}

/// login
///
/// [Public Route] Password sign-in. Sets both session cookies on success.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let backend = backend(&state)?;
    let email = validate_email(&payload.email)?;

    let tokens = backend
        .auth
        .sign_in_with_password(email, &payload.password)
        .await?;
    sync_verified_flag(backend, &tokens.user).await;

    let cookies = session_cookies(&tokens, state.config.secure_cookies());
    let body = SessionResponse {
        user: SessionUser::from(tokens.user),
        signed_in: true,
    };
    Ok((set_cookies(cookies), Json(body)).into_response())
}

/// logout
///
/// [Public Route] Revokes the session upstream (best-effort) and always clears the
/// cookies, even when the session was already gone.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Session cleared"))
)]
pub async fn logout(
    State(state): State<AppState>,
    MaybeAccessToken(token): MaybeAccessToken,
) -> Response {
    if let (Some(backend), Some(token)) = (state.backend.as_ref(), token) {
        if let Err(e) = backend.auth.sign_out(&token).await {
            tracing::warn!(error = %e, "upstream sign-out failed");
        }
    }

    (
        StatusCode::NO_CONTENT,
        set_cookies(clear_session_cookies(state.config.secure_cookies())),
    )
        .into_response()
}

/// resend_verification
///
/// [Public Route] Sends the sign-up confirmation email again.
#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 204, description = "Email sent"),
        (status = 400, description = "Invalid email or rate limited")
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    let backend = backend(&state)?;
    let email = validate_email(&payload.email)?;

    let redirect_to = format!("{}/verify-email", state.config.site_url);
    backend.auth.resend_verification(email, &redirect_to).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// forgot_password
///
/// [Public Route] Starts password recovery. Answers 204 whether or not the address
/// belongs to an account.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = EmailRequest,
    responses((status = 204, description = "Recovery email sent if the account exists"))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    let backend = backend(&state)?;
    let email = validate_email(&payload.email)?;

    let redirect_to = format!("{}{}", state.config.site_url, RESET_PASSWORD_PATH);
    match backend.auth.recover_password(email, &redirect_to).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) if e.is_rejection() => {
            tracing::debug!(error = %e, "recovery request rejected");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(e.into()),
    }
}

/// reset_password
///
/// [Public Route, session required] Sets a new password for the current session,
/// typically right after following a recovery link.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 401, description = "No session")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let backend = backend(&state)?;
    let password = validate_password(&payload.password)?;

    backend.auth.update_password(&token, password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// session
///
/// [Public Route] The identity the gate resolved for this request, or 204.
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 204, description = "No session")
    )
)]
pub async fn session(MaybeAuthUser(user): MaybeAuthUser) -> Response {
    match user {
        Some(user) => Json(SessionResponse {
            user,
            signed_in: true,
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// verify_email
///
/// [Public Route] Target of the links in confirmation and recovery emails.
///
/// Redeems the token, records the confirmation in `profiles`, sets the session cookies
/// and redirects: recovery links go to the reset-password page, everything else to the
/// app home. Bad or expired links land back on the confirm-email page with an error code.
#[utoipa::path(
    get,
    path = "/verify-email",
    params(VerifyEmailQuery),
    responses((status = 302, description = "Redirect to the next page"))
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Response {
    let Some(backend) = state.backend.as_ref() else {
        return redirect(&format!("{VERIFY_PATH}?error=unavailable"));
    };

    let kind = query.kind.as_deref().unwrap_or("signup");
    let token_hash = match query.token_hash.as_deref() {
        Some(hash) if !hash.is_empty() && OTP_KINDS.contains(&kind) => hash,
        _ => return redirect(&format!("{VERIFY_PATH}?error=invalid_link")),
    };

    let tokens = match backend.auth.verify_otp(token_hash, kind).await {
        Ok(tokens) => tokens,
        Err(e) if e.is_rejection() => {
            tracing::info!(error = %e, "verification link rejected");
            return redirect(&format!("{VERIFY_PATH}?error=invalid_link"));
        }
        Err(e) => {
            tracing::error!(error = %e, "verification link could not be checked");
            return redirect(&format!("{VERIFY_PATH}?error=unavailable"));
        }
    };

    let user = &tokens.user;
    if kind != "recovery" {
        // Users created before the profiles mirror existed have no row yet.
        let email = user.email.clone().unwrap_or_default();
        let marked = match backend.profiles.create_profile(user.id, &email).await {
            Ok(()) => backend.profiles.mark_email_verified(user.id).await,
            Err(e) => Err(e),
        };
        match marked {
            Ok(true) => tracing::info!(user_id = %user.id, "email verified"),
            Ok(false) => tracing::warn!(user_id = %user.id, "no profile row to mark verified"),
            Err(e) => tracing::error!(user_id = %user.id, error = %e, "failed to mark email verified"),
        }
    }

    let destination = if kind == "recovery" {
        RESET_PASSWORD_PATH
    } else {
        state.config.app_home.as_str()
    };

    let mut response = redirect(destination);
    for cookie in session_cookies(&tokens, state.config.secure_cookies()) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// get_me
///
/// [Authenticated Route] Profile summary, including the verification flag as stored.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = MeResponse),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(
    AuthUser { id, email }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, ApiError> {
    let backend = backend(&state)?;

    let email_verified = match backend.profiles.email_verification(id).await {
        VerificationLookup::Found(flag) => flag,
        VerificationLookup::NotFound => None,
        VerificationLookup::Error(e) => {
            tracing::warn!(user_id = %id, error = %e, "verification lookup failed");
            None
        }
    };

    Ok(Json(MeResponse {
        id,
        email,
        email_verified,
    }))
}
