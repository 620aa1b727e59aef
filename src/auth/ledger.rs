//! Persisted record of every issued token.
//!
//! Entries for refresh tokens decide whether a refresh is allowed. Entries for
//! access tokens are bookkeeping only (audit and logout); authentication of an
//! access token never consults the ledger, so revoking one is advisory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::store::StoreResult;

/// What a ledger entry's token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("ACCESS"),
            TokenKind::Refresh => f.write_str("REFRESH"),
        }
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    /// The signed token string; unique across the ledger.
    pub token: String,
    pub kind: TokenKind,
    pub revoked: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_id: i64,
}

impl LedgerEntry {
    /// Whether the entry is past its recorded expiry or flagged as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expires_at <= now
    }
}

/// Fields required to record a freshly issued token.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub token: String,
    pub kind: TokenKind,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Storage contract for the token ledger.
///
/// Writes made by one request must be visible to later reads from other
/// requests (read-committed is enough); the ledger itself does no locking.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Inserts a new entry, not revoked and not expired.
    ///
    /// A duplicate token string is a logic error and fails with
    /// [`StoreError::Conflict`](crate::store::StoreError::Conflict).
    async fn record(&self, entry: NewLedgerEntry) -> StoreResult<LedgerEntry>;

    async fn lookup(&self, token: &str) -> StoreResult<Option<LedgerEntry>>;

    /// Flags the entry as revoked. Returns `false` if the token is unknown.
    async fn revoke(&self, token: &str) -> StoreResult<bool>;

    /// Flags the entry as expired. Returns `false` if the token is unknown.
    async fn mark_expired(&self, token: &str) -> StoreResult<bool>;

    /// Revokes every entry owned by `user_id` that is not already revoked and
    /// returns how many were flipped.
    async fn revoke_all_for_user(&self, user_id: i64) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(expires_in: Duration) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            id: Uuid::new_v4(),
            token: "token".to_string(),
            kind: TokenKind::Refresh,
            revoked: false,
            expired: false,
            created_at: now,
            expires_at: now + expires_in,
            user_id: 1,
        }
    }

    #[test]
    fn test_expiry_uses_flag_or_instant() {
        let now = Utc::now();

        let live = entry(Duration::hours(1));
        assert!(!live.is_expired_at(now));

        let lapsed = entry(Duration::hours(-1));
        assert!(lapsed.is_expired_at(now));

        let flagged = LedgerEntry {
            expired: true,
            ..entry(Duration::hours(1))
        };
        assert!(flagged.is_expired_at(now));
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&TokenKind::Refresh).unwrap(), "\"REFRESH\"");
        assert_eq!(TokenKind::Access.to_string(), "ACCESS");
    }
}
