use nutrigate::{
    Gate, MockProfileRepository, Outcome, RouteTable,
    gate::{decide, needs_verification_lookup},
    models::SessionUser,
    repository::VerificationLookup,
};
use std::sync::Arc;
use uuid::Uuid;

fn session() -> SessionUser {
    SessionUser {
        id: Uuid::from_u128(7),
        email: Some("sam@example.com".to_string()),
    }
}

const GATED_PATHS: &[&str] = &["/dashboard", "/planner", "/settings", "/api/me", "/sleep/log"];

// --- Pure decision ---

#[test]
fn test_static_assets_always_continue() {
    let routes = RouteTable::default();
    let user = session();
    let unverified = VerificationLookup::Found(Some(false));

    for path in ["/icons/logo.svg", "/_next/static/app.js", "/favicon.ico"] {
        assert_eq!(decide(&routes, None, path, None), Outcome::Continue);
        assert_eq!(
            decide(&routes, Some(&user), path, Some(&unverified)),
            Outcome::Continue
        );
        assert!(!needs_verification_lookup(&routes, Some(&user), path));
    }
}

#[test]
fn test_anonymous_on_gated_path_goes_to_login_with_verbatim_path() {
    let routes = RouteTable::default();

    for path in GATED_PATHS {
        assert_eq!(
            decide(&routes, None, path, None),
            Outcome::RedirectToLogin {
                return_to: path.to_string()
            }
        );
    }
}

#[test]
fn test_anonymous_on_public_path_continues() {
    let routes = RouteTable::default();

    for path in [
        "/",
        "/login",
        "/signup",
        "/forgot-password",
        "/reset-password",
        "/confirm-email",
        "/verify-email",
        "/api/auth/resend-verification",
    ] {
        assert_eq!(decide(&routes, None, path, None), Outcome::Continue, "{path}");
    }
}

#[test]
fn test_explicitly_unverified_goes_to_confirm_email() {
    let routes = RouteTable::default();
    let user = session();
    let lookup = VerificationLookup::Found(Some(false));

    for path in GATED_PATHS.iter().chain(["/", "/login", "/reset-password"].iter()) {
        assert_eq!(
            decide(&routes, Some(&user), path, Some(&lookup)),
            Outcome::RedirectToVerify,
            "{path}"
        );
    }
}

#[test]
fn test_non_blocking_lookups_never_redirect_to_verify() {
    let routes = RouteTable::default();
    let user = session();

    for lookup in [
        VerificationLookup::Found(Some(true)),
        VerificationLookup::Found(None),
        VerificationLookup::NotFound,
        VerificationLookup::Error("timeout".to_string()),
    ] {
        for path in GATED_PATHS {
            assert_eq!(
                decide(&routes, Some(&user), path, Some(&lookup)),
                Outcome::Continue,
                "{path} {lookup:?}"
            );
        }
        // Falls through to the later rules.
        assert_eq!(
            decide(&routes, Some(&user), "/login", Some(&lookup)),
            Outcome::RedirectToAppHome
        );
    }
}

#[test]
fn test_unverified_user_can_reach_the_confirmation_flow() {
    let routes = RouteTable::default();
    let user = session();
    let lookup = VerificationLookup::Found(Some(false));

    for path in ["/confirm-email", "/verify-email", "/api/auth/logout"] {
        assert!(!needs_verification_lookup(&routes, Some(&user), path));
        assert_eq!(
            decide(&routes, Some(&user), path, Some(&lookup)),
            Outcome::Continue,
            "{path}"
        );
    }
}

#[test]
fn test_signed_in_user_is_bounced_from_auth_pages_and_home() {
    let routes = RouteTable::default();
    let user = session();
    let verified = VerificationLookup::Found(Some(true));

    for path in ["/login", "/signup", "/forgot-password", "/"] {
        assert_eq!(
            decide(&routes, Some(&user), path, Some(&verified)),
            Outcome::RedirectToAppHome,
            "{path}"
        );
    }
    assert_eq!(
        decide(&routes, Some(&user), "/reset-password", Some(&verified)),
        Outcome::Continue
    );
}

#[test]
fn test_outcome_locations() {
    assert_eq!(Outcome::Continue.location("/dashboard"), None);
    assert_eq!(
        Outcome::RedirectToLogin {
            return_to: "/planner".to_string()
        }
        .location("/dashboard")
        .as_deref(),
        Some("/login?redirectTo=%2Fplanner")
    );
    assert_eq!(
        Outcome::RedirectToLogin {
            return_to: "/meals/week 2".to_string()
        }
        .location("/dashboard")
        .as_deref(),
        Some("/login?redirectTo=%2Fmeals%2Fweek+2")
    );
    assert_eq!(
        Outcome::RedirectToVerify.location("/dashboard").as_deref(),
        Some("/confirm-email")
    );
    assert_eq!(
        Outcome::RedirectToAppHome.location("/home").as_deref(),
        Some("/home")
    );
}

// --- Gate::evaluate (with the profile lookup) ---

#[tokio::test]
async fn test_evaluate_looks_up_flag_only_when_needed() {
    let user = session();
    let profiles = Arc::new(MockProfileRepository::new().with_profile(user.id, Some(false)));
    let gate = Gate::new(Arc::new(RouteTable::default()), profiles.clone());

    assert_eq!(gate.evaluate(None, "/planner").await, Outcome::RedirectToLogin {
        return_to: "/planner".to_string()
    });
    assert_eq!(gate.evaluate(Some(&user), "/icons/a.png").await, Outcome::Continue);
    assert_eq!(gate.evaluate(Some(&user), "/confirm-email").await, Outcome::Continue);
    assert_eq!(profiles.lookup_count(), 0);

    assert_eq!(
        gate.evaluate(Some(&user), "/settings").await,
        Outcome::RedirectToVerify
    );
    assert_eq!(profiles.lookup_count(), 1);
}

#[tokio::test]
async fn test_evaluate_lookup_failure_is_not_blocking() {
    let user = session();
    let gate = Gate::new(
        Arc::new(RouteTable::default()),
        Arc::new(MockProfileRepository::new_failing()),
    );

    assert_eq!(gate.evaluate(Some(&user), "/settings").await, Outcome::Continue);
    assert_eq!(
        gate.evaluate(Some(&user), "/").await,
        Outcome::RedirectToAppHome
    );
}

#[tokio::test]
async fn test_evaluate_missing_profile_is_not_blocking() {
    let gate = Gate::new(
        Arc::new(RouteTable::default()),
        Arc::new(MockProfileRepository::new()),
    );

    assert_eq!(gate.evaluate(Some(&session()), "/planner").await, Outcome::Continue);
}
