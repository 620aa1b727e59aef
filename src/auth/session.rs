//! Login, refresh, and logout.
//!
//! Refresh cycle per refresh token: `ISSUED → {VALID, REVOKED, EXPIRED}`.
//! Refresh tokens are reusable until they expire or are revoked; a refresh
//! only mints a new access token and never rotates the refresh token.

use bcrypt::DEFAULT_COST;
use chrono::{Duration, Utc};
use log::{info, warn};
use serde_json::{json, Map};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::ledger::{NewLedgerEntry, TokenKind, TokenLedger};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{
    Signer, SignerError, VerificationError, REFRESH_TOKEN_USE, TOKEN_USE_CLAIM,
};
use crate::models::User;
use crate::store::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown email, wrong password, or inactive account. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Refresh token not found")]
    RefreshTokenNotFound,

    #[error("Refresh token has been revoked")]
    RefreshTokenRevoked,

    #[error("Refresh token has expired")]
    RefreshTokenExpired,

    #[error("Refresh token signature is invalid")]
    SignatureInvalid,

    /// The token's subject no longer resolves to an active user.
    #[error("Token subject is not an active user")]
    SubjectUnavailable,

    #[error("Token signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Token lifetimes and password hashing cost.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(24),
            refresh_ttl: Duration::days(7),
            bcrypt_cost: DEFAULT_COST,
        }
    }
}

/// The two tokens handed out by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    signer: Arc<Signer>,
    ledger: Arc<dyn TokenLedger>,
    users: Arc<dyn UserStore>,
    config: SessionConfig,
    // Verified against when the email is unknown so both paths cost one bcrypt run.
    dummy_hash: String,
}

impl SessionService {
    pub fn new(
        signer: Arc<Signer>,
        ledger: Arc<dyn TokenLedger>,
        users: Arc<dyn UserStore>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let dummy_hash = hash_password("placeholder-password", config.bcrypt_cost)
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        Ok(Self {
            signer,
            ledger,
            users,
            config,
            dummy_hash,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }

    /// Checks credentials and issues an access/refresh pair, recording both in the ledger.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, SessionError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                self.password_matches(password, &self.dummy_hash).await?;
                warn!("login rejected: unknown account");
                return Err(SessionError::InvalidCredentials);
            }
        };

        if !self.password_matches(password, &user.password_hash).await? {
            warn!("login rejected for user {}: bad password", user.id);
            return Err(SessionError::InvalidCredentials);
        }
        if !user.is_active {
            warn!("login rejected for user {}: account inactive", user.id);
            return Err(SessionError::InvalidCredentials);
        }

        let access_token = self.issue(&user, TokenKind::Access).await?;
        let refresh_token = self.issue(&user, TokenKind::Refresh).await?;
        info!("login succeeded for user {}", user.id);

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Mints a new access token from a ledgered, unrevoked, unexpired refresh token.
    ///
    /// Checks run in a fixed order: ledger presence, revocation, ledger expiry,
    /// then signature and signed expiry, then the subject's account.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        let entry = match self.ledger.lookup(refresh_token).await? {
            Some(entry) if entry.kind == TokenKind::Refresh => entry,
            _ => return Err(rejected(SessionError::RefreshTokenNotFound)),
        };

        if entry.revoked {
            return Err(rejected(SessionError::RefreshTokenRevoked));
        }
        if entry.is_expired_at(Utc::now()) {
            self.ledger.mark_expired(&entry.token).await?;
            return Err(rejected(SessionError::RefreshTokenExpired));
        }

        let claims = match self.signer.verify(refresh_token) {
            Ok(claims) => claims,
            Err(VerificationError::Expired) => {
                self.ledger.mark_expired(&entry.token).await?;
                return Err(rejected(SessionError::RefreshTokenExpired));
            }
            Err(_) => return Err(rejected(SessionError::SignatureInvalid)),
        };

        let user = match self.users.find_by_email(&claims.sub).await? {
            Some(user) if user.is_active && user.id == entry.user_id => user,
            _ => return Err(rejected(SessionError::SubjectUnavailable)),
        };

        let access_token = self.issue(&user, TokenKind::Access).await?;
        info!("issued refreshed access token for user {}", user.id);
        Ok(access_token)
    }

    /// Revokes every ledger entry belonging to `user_id`.
    pub async fn logout(&self, user_id: i64) -> Result<u64, SessionError> {
        let revoked = self.ledger.revoke_all_for_user(user_id).await?;
        info!("logout revoked {} ledger entries for user {}", revoked, user_id);
        Ok(revoked)
    }

    /// Revokes a single token. Returns `false` if it was never recorded.
    pub async fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        Ok(self.ledger.revoke(token).await?)
    }

    async fn issue(&self, user: &User, kind: TokenKind) -> Result<String, SessionError> {
        let (ttl, extra) = match kind {
            TokenKind::Access => (self.config.access_ttl, Map::new()),
            TokenKind::Refresh => {
                let mut extra = Map::new();
                extra.insert(TOKEN_USE_CLAIM.to_string(), json!(REFRESH_TOKEN_USE));
                (self.config.refresh_ttl, extra)
            }
        };

        let issued = self.signer.issue(&user.email, ttl, extra)?;
        self.ledger
            .record(NewLedgerEntry {
                token: issued.token.clone(),
                kind,
                user_id: user.id,
                issued_at: issued.issued_at,
                expires_at: issued.expires_at,
            })
            .await?;

        Ok(issued.token)
    }

    /// bcrypt is CPU-bound; it runs on the blocking pool instead of a request worker.
    async fn password_matches(&self, password: &str, hash: &str) -> Result<bool, SessionError> {
        let (password, hash) = (password.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?
            .map_err(|e| SessionError::Internal(e.to_string()))
    }
}

fn rejected(reason: SessionError) -> SessionError {
    warn!("refresh rejected: {}", reason);
    reason
}
