//! Route classification table.
//!
//! Membership is fixed at construction: an ordered list of `(Matcher, Category)`
//! pairs where the first match wins and anything unmatched is `Protected`.

/// Category
///
/// The access class of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Framework internals, icons, anything with a file extension. Never gated.
    StaticAsset,
    /// Reachable without a session.
    Public,
    /// Requires a session. The catch-all.
    Protected,
}

/// Matcher
///
/// How a single table entry tests a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Exact(&'static str),
    /// Matches the prefix itself and anything below it (`/a` matches `/a` and `/a/b`,
    /// not `/ab`). A prefix ending in `/` matches everything that starts with it.
    Prefix(&'static str),
    /// Last path segment carries an extension, e.g. `/icons/logo.svg`.
    FileExtension,
}

impl Matcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Exact(exact) => path == *exact,
            Matcher::Prefix(prefix) if prefix.ends_with('/') => path.starts_with(prefix),
            Matcher::Prefix(prefix) => match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            Matcher::FileExtension => {
                let segment = path.rsplit('/').next().unwrap_or_default();
                match segment.rfind('.') {
                    // A leading dot is a hidden name, not an extension.
                    Some(dot) => dot > 0 && dot + 1 < segment.len(),
                    None => false,
                }
            }
        }
    }
}

/// RouteTable
///
/// The application's route configuration.
///
/// * `entries`: ordered `(Matcher, Category)` pairs deciding the primary category.
/// * `auth_only`: pages meant for signed-out users (login, signup, ...). Signed-in
///   users are bounced to the app home. Overlaps with `Public`.
/// * `verification_exempt`: paths reachable by signed-in users whose email is not
///   confirmed yet (the confirmation flow itself).
/// * `marketing_home`: the landing page; signed-in users skip it.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub entries: Vec<(Matcher, Category)>,
    pub auth_only: Vec<Matcher>,
    pub verification_exempt: Vec<Matcher>,
    pub marketing_home: &'static str,
}

impl Default for RouteTable {
    fn default() -> Self {
        use Category::*;
        use Matcher::*;

        Self {
            entries: vec![
                // Static and framework paths first; they bypass every auth check.
                (Prefix("/_next/"), StaticAsset),
                (Prefix("/assets/"), StaticAsset),
                (Prefix("/icons/"), StaticAsset),
                (Prefix("/brand/"), StaticAsset),
                (FileExtension, StaticAsset),
                // Exact public pages.
                (Exact("/"), Public),
                (Exact("/login"), Public),
                (Exact("/signup"), Public),
                (Exact("/forgot-password"), Public),
                (Exact("/reset-password"), Public),
                (Exact("/confirm-email"), Public),
                (Exact("/health"), Public),
                // Public zones.
                (Prefix("/verify-email"), Public),
                (Prefix("/api/auth"), Public),
            ],
            auth_only: vec![Exact("/login"), Exact("/signup"), Exact("/forgot-password")],
            verification_exempt: vec![
                Exact("/confirm-email"),
                Prefix("/verify-email"),
                Prefix("/api/auth"),
            ],
            marketing_home: "/",
        }
    }
}

impl RouteTable {
    /// classify
    ///
    /// Total over all paths: the first matching entry decides, `Protected` otherwise.
    pub fn classify(&self, path: &str) -> Category {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Protected)
    }

    pub fn is_auth_only(&self, path: &str) -> bool {
        self.auth_only.iter().any(|m| m.matches(path))
    }

    pub fn is_verification_exempt(&self, path: &str) -> bool {
        self.verification_exempt.iter().any(|m| m.matches(path))
    }

    pub fn is_marketing_home(&self, path: &str) -> bool {
        path == self.marketing_home
    }
}
