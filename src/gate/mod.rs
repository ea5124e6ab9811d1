//! Per-request access gate.
//!
//! `classifier` maps a path to its access class, `decide` turns (session, path,
//! verification flag) into an `Outcome`, and `middleware` wires both into axum.

pub mod classifier;
pub mod middleware;

use std::sync::Arc;
use url::form_urlencoded;

use crate::{
    models::SessionUser,
    repository::{ProfileState, VerificationLookup},
};
use classifier::{Category, RouteTable};

pub const LOGIN_PATH: &str = "/login";
pub const VERIFY_PATH: &str = "/confirm-email";

/// Outcome
///
/// What the gate does with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the request to the application unchanged.
    Continue,
    /// No session; send to login and come back to `return_to` afterwards.
    RedirectToLogin { return_to: String },
    /// Signed in, but the email address is explicitly unconfirmed.
    RedirectToVerify,
    /// Signed in and asking for a signed-out page.
    RedirectToAppHome,
}

impl Outcome {
    /// Target of the redirect, or `None` for `Continue`.
    pub fn location(&self, app_home: &str) -> Option<String> {
        match self {
            Outcome::Continue => None,
            Outcome::RedirectToLogin { return_to } => Some(format!(
                "{LOGIN_PATH}?redirectTo={}",
                form_urlencoded::byte_serialize(return_to.as_bytes()).collect::<String>()
            )),
            Outcome::RedirectToVerify => Some(VERIFY_PATH.to_string()),
            Outcome::RedirectToAppHome => Some(app_home.to_string()),
        }
    }
}

/// needs_verification_lookup
///
/// The flag is only read for signed-in users on gated paths outside the
/// confirmation flow.
pub fn needs_verification_lookup(
    routes: &RouteTable,
    session: Option<&SessionUser>,
    path: &str,
) -> bool {
    session.is_some()
        && routes.classify(path) != Category::StaticAsset
        && !routes.is_verification_exempt(path)
}

/// decide
///
/// Pure decision over already-resolved inputs. First matching rule wins:
///
/// 1. static asset: continue, no auth involved
/// 2. no session on a non-public path: login, carrying the original path
/// 3. session, non-exempt path, flag explicitly `false`: confirm-email
/// 4. session on an auth-only page: app home
/// 5. session on the marketing home: app home
/// 6. continue
///
/// A missing row, a null flag or a failed lookup never blocks (rule 3 falls through).
pub fn decide(
    routes: &RouteTable,
    session: Option<&SessionUser>,
    path: &str,
    verification: Option<&VerificationLookup>,
) -> Outcome {
    let category = routes.classify(path);
    if category == Category::StaticAsset {
        return Outcome::Continue;
    }

    if session.is_none() {
        return match category {
            Category::Public => Outcome::Continue,
            _ => Outcome::RedirectToLogin {
                return_to: path.to_string(),
            },
        };
    }

    if !routes.is_verification_exempt(path)
        && verification.is_some_and(VerificationLookup::is_explicitly_unverified)
    {
        return Outcome::RedirectToVerify;
    }

    if routes.is_auth_only(path) || routes.is_marketing_home(path) {
        return Outcome::RedirectToAppHome;
    }

    Outcome::Continue
}

/// Gate
///
/// Couples the route table with the profile store so the verification lookup is
/// made only when `decide` would look at it.
#[derive(Clone)]
pub struct Gate {
    routes: Arc<RouteTable>,
    profiles: ProfileState,
}

impl Gate {
    pub fn new(routes: Arc<RouteTable>, profiles: ProfileState) -> Self {
        Self { routes, profiles }
    }

    /// evaluate
    ///
    /// Performs at most one profile read, after the session is already known.
    pub async fn evaluate(&self, session: Option<&SessionUser>, path: &str) -> Outcome {
        let lookup = match session {
            Some(user) if needs_verification_lookup(&self.routes, session, path) => {
                let lookup = self.profiles.email_verification(user.id).await;
                match &lookup {
                    VerificationLookup::Error(e) => tracing::warn!(
                        user_id = %user.id,
                        error = %e,
                        "verification lookup failed, not blocking"
                    ),
                    VerificationLookup::NotFound => {
                        tracing::debug!(user_id = %user.id, "no profile row, not blocking")
                    }
                    VerificationLookup::Found(_) => {}
                }
                Some(lookup)
            }
            _ => None,
        };

        decide(&self.routes, session, path, lookup.as_ref())
    }
}
