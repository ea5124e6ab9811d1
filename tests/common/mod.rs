#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
    routing::{get as get_route, post as post_route},
};
use nutrigate::{
    AppConfig, AppState, Backend, MockAuthProvider, MockProfileRepository, RouteTable,
    SupabaseAuthClient, create_router,
    models::{AuthServiceUser, SessionTokens},
};
use serde_json::Value;
use tokio::net::TcpListener;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const VERIFIED_ID: Uuid = Uuid::from_u128(1);
pub const UNVERIFIED_ID: Uuid = Uuid::from_u128(2);
pub const NO_PROFILE_ID: Uuid = Uuid::from_u128(3);

pub const VERIFIED_TOKEN: &str = "access-verified";
pub const UNVERIFIED_TOKEN: &str = "access-unverified";
pub const NO_PROFILE_TOKEN: &str = "access-no-profile";

pub fn user(id: Uuid, email: &str) -> AuthServiceUser {
    AuthServiceUser {
        id,
        email: Some(email.to_string()),
        email_confirmed_at: None,
    }
}

pub fn issued(access: &str, refresh: &str, user: AuthServiceUser) -> SessionTokens {
    SessionTokens {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_in: 3600,
        user,
    }
}

/// Auth service that knows three signed-in users.
pub fn default_auth() -> MockAuthProvider {
    MockAuthProvider::new()
        .with_access_token(VERIFIED_TOKEN, user(VERIFIED_ID, "ok@example.com"))
        .with_access_token(UNVERIFIED_TOKEN, user(UNVERIFIED_ID, "new@example.com"))
        .with_access_token(NO_PROFILE_TOKEN, user(NO_PROFILE_ID, "ghost@example.com"))
}

/// Profile table matching `default_auth`: one verified, one not, one missing.
pub fn default_profiles() -> MockProfileRepository {
    MockProfileRepository::new()
        .with_profile(VERIFIED_ID, Some(true))
        .with_profile(UNVERIFIED_ID, Some(false))
}

pub struct TestApp {
    pub router: Router,
    pub auth: Arc<MockAuthProvider>,
    pub profiles: Arc<MockProfileRepository>,
}

pub fn spawn_app(auth: MockAuthProvider, profiles: MockProfileRepository) -> TestApp {
    let auth = Arc::new(auth);
    let profiles = Arc::new(profiles);
    let routes = Arc::new(RouteTable::default());

    let config = AppConfig {
        // Nothing to serve: pages that get through the gate answer 404.
        static_dir: "./target/nutrigate-test-missing-dir".to_string(),
        ..AppConfig::default()
    };

    let backend = Backend::new(auth.clone(), profiles.clone(), routes.clone(), None, false);
    let state = AppState {
        backend: Some(backend),
        routes,
        config,
    };

    TestApp {
        router: create_router(state),
        auth,
        profiles,
    }
}

/// spawn_auth_service
///
/// Starts a stand-in for the hosted `/auth/v1` API on an ephemeral port and returns
/// its base URL. `user` answers `GET /auth/v1/user`, `token` answers
/// `POST /auth/v1/token` (refresh and password grants).
pub async fn spawn_auth_service(user: (StatusCode, Value), token: (StatusCode, Value)) -> String {
    let service = Router::new()
        .route(
            "/auth/v1/user",
            get_route(move || {
                let (status, body) = user.clone();
                async move { (status, Json(body)) }
            }),
        )
        .route(
            "/auth/v1/token",
            post_route(move || {
                let (status, body) = token.clone();
                async move { (status, Json(body)) }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, service).await.unwrap();
    });
    format!("http://{addr}")
}

/// Full router whose gate talks to a real `SupabaseAuthClient` at `base_url`.
pub fn spawn_app_with_client(base_url: &str, profiles: MockProfileRepository) -> Router {
    let client = SupabaseAuthClient::new(base_url, "anon-key").unwrap();
    let routes = Arc::new(RouteTable::default());
    let config = AppConfig {
        static_dir: "./target/nutrigate-test-missing-dir".to_string(),
        ..AppConfig::default()
    };

    let backend = Backend::new(
        Arc::new(client),
        Arc::new(profiles),
        routes.clone(),
        None,
        false,
    );
    create_router(AppState {
        backend: Some(backend),
        routes,
        config,
    })
}

pub fn spawn_app_without_backend() -> Router {
    let config = AppConfig {
        static_dir: "./target/nutrigate-test-missing-dir".to_string(),
        ..AppConfig::default()
    };
    create_router(AppState::without_backend(config))
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn access_cookie(token: &str) -> String {
    format!("sb-access-token={token}")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn location<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
