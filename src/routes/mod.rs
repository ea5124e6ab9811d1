/// Router Module Index
///
/// API routes split by access requirement. Page routes are not listed here: the
/// compiled web bundle is served by the static fallback in `create_router`, behind
/// the same gate.

/// Routes reachable without a session.
pub mod public;

/// Routes that need an `AuthUser`.
pub mod authenticated;
