use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::StoreError;

/// VerificationLookup
///
/// Outcome of reading a user's `email_verified` flag. The three-way split keeps
/// "row exists but flag is null", "no row" and "read failed" apart so the gate can
/// decide on each explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationLookup {
    /// Profile row exists. `None` when the column is null.
    Found(Option<bool>),
    NotFound,
    Error(String),
}

impl VerificationLookup {
    /// Only an explicit `false` blocks a user.
    pub fn is_explicitly_unverified(&self) -> bool {
        matches!(self, VerificationLookup::Found(Some(false)))
    }
}

/// ProfileRepository
///
/// Persistence contract for the `profiles` table, mirrored one row per auth user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Reads the verification flag for `user_id`. Never fails; errors are folded
    /// into `VerificationLookup::Error`.
    async fn email_verification(&self, user_id: Uuid) -> VerificationLookup;

    /// Creates the mirror row for a new user with `email_verified = false`.
    /// Idempotent: an existing row is left alone.
    async fn create_profile(&self, user_id: Uuid, email: &str) -> Result<(), StoreError>;

    /// Flips the flag to true. Returns false when no row matched.
    async fn mark_email_verified(&self, user_id: Uuid) -> Result<bool, StoreError>;
}

/// ProfileState
///
/// The concrete type used to share the profile store across the application state.
pub type ProfileState = Arc<dyn ProfileRepository>;

/// PostgresProfileRepository
///
/// The concrete implementation backed by the hosted Postgres database.
pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn email_verification(&self, user_id: Uuid) -> VerificationLookup {
        let row = sqlx::query_scalar::<_, Option<bool>>(
            "SELECT email_verified FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(flag)) => VerificationLookup::Found(flag),
            Ok(None) => VerificationLookup::NotFound,
            Err(e) => VerificationLookup::Error(e.to_string()),
        }
    }

    async fn create_profile(&self, user_id: Uuid, email: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (id, email, email_verified) VALUES ($1, $2, false) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE profiles SET email_verified = true WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- Mock Implementation (tests) ---

/// MockProfileRepository
///
/// In-memory profile table. `failing` makes every lookup report a read error and
/// every write return `StoreError`.
#[derive(Default)]
pub struct MockProfileRepository {
    pub profiles: Mutex<HashMap<Uuid, Option<bool>>>,
    pub failing: bool,
    pub lookups: Mutex<u32>,
}

impl MockProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_profile(self, user_id: Uuid, email_verified: Option<bool>) -> Self {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(user_id, email_verified);
        }
        self
    }

    /// Number of `email_verification` calls made so far.
    pub fn lookup_count(&self) -> u32 {
        self.lookups.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn flag(&self, user_id: Uuid) -> Option<Option<bool>> {
        self.profiles
            .lock()
            .ok()
            .and_then(|profiles| profiles.get(&user_id).copied())
    }
}

#[async_trait]
impl ProfileRepository for MockProfileRepository {
    async fn email_verification(&self, user_id: Uuid) -> VerificationLookup {
        if let Ok(mut n) = self.lookups.lock() {
            *n += 1;
        }
        if self.failing {
            return VerificationLookup::Error("mock: connection reset".to_string());
        }
        match self.flag(user_id) {
            Some(flag) => VerificationLookup::Found(flag),
            None => VerificationLookup::NotFound,
        }
    }

    async fn create_profile(&self, user_id: Uuid, _email: &str) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError(sqlx::Error::PoolTimedOut));
        }
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.entry(user_id).or_insert(Some(false));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<bool, StoreError> {
        if self.failing {
            return Err(StoreError(sqlx::Error::PoolTimedOut));
        }
        let mut profiles = match self.profiles.lock() {
            Ok(profiles) => profiles,
            Err(_) => return Ok(false),
        };
        match profiles.get_mut(&user_id) {
            Some(flag) => {
                *flag = Some(true);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
