//! Session correlation between local sessions and provider ID tokens.
//!
//! When the token response of a login is parsed, a random correlation
//! token is generated, stored in the local session under the scope's key,
//! and persisted together with the provider's ID token. At logout the
//! token is resolved back to the ID token so the provider-side session can
//! be terminated too. Records live for a fixed day and are removed in bulk
//! by the expiry reaper.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// How long a correlation record stays resolvable before the reaper may
/// remove it.
pub const CORRELATION_TTL_SECS: i64 = 86_400;

/// Generates a fresh correlation token.
///
/// Opaque to everyone but the store; the only contract is uniqueness and
/// unguessability. Collisions are treated as negligible, not defended
/// against.
#[must_use]
pub fn generate_correlation_token() -> String {
    Uuid::new_v4().to_string()
}

/// One persisted correlation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    /// Surrogate key of the row.
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The random token handed to the local session.
    pub token: String,
    /// The provider's ID token, if the response carried one.
    pub id_token: Option<String>,
}

impl CorrelationRecord {
    /// Builds a new record with a fresh token, expiring one TTL from `now`.
    #[must_use]
    pub fn new(id_token: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            created_at: now,
            expires_at: now + Duration::seconds(CORRELATION_TTL_SECS),
            token: generate_correlation_token(),
            id_token,
        }
    }

    /// True iff the record has passed its expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Persistence for correlation records.
///
/// Each login appends one row; rows are read-only afterwards and age out
/// via [`reap`](CorrelationStore::reap). Lookup performs no expiry filter:
/// an expired row that the reaper has not removed yet still resolves, the
/// daily reap being the sole expiry mechanism.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Persists a new record for the given ID token and returns the fresh
    /// correlation token.
    async fn create(&self, id_token: Option<&str>) -> Result<String, StoreError>;

    /// Resolves a correlation token to the stored ID token.
    ///
    /// Returns `None` for an empty token, a token without a row, and a row
    /// whose stored ID token is empty.
    async fn resolve(&self, token: &str) -> Result<Option<String>, StoreError>;

    /// Deletes every record with `expires_at < now`, returning the count.
    ///
    /// Idempotent and safe to run concurrently; zero matches is not an
    /// error.
    async fn reap(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
