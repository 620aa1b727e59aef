//! Signed token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `sub` (the user's email), `iat`, `exp`, a
//! random `jti`, and optional extra claims. The [`Signer`] owns the process-wide
//! key and has no knowledge of persistence; it is constructed once at startup
//! and shared by reference.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Shortest HMAC secret accepted by [`Signer::new`].
pub const MIN_SECRET_LEN: usize = 32;

/// Extra claim marking what a token may be used for.
pub const TOKEN_USE_CLAIM: &str = "typ";
/// Value of [`TOKEN_USE_CLAIM`] on refresh tokens.
pub const REFRESH_TOKEN_USE: &str = "refresh";

const RESERVED_CLAIMS: [&str; 4] = ["sub", "iat", "exp", "jti"];

/// Represents the claims encoded within a token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject of the token: the user's email address.
    pub sub: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch.
    pub exp: i64,
    /// Random token id; keeps tokens issued in the same second distinct.
    pub jti: String,
    /// Any additional claims supplied at issuance.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// The value of the `typ` claim, if present.
    pub fn token_use(&self) -> Option<&str> {
        self.extra.get(TOKEN_USE_CLAIM).and_then(Value::as_str)
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_use() == Some(REFRESH_TOKEN_USE)
    }
}

/// Why a token failed verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The signature does not match the payload under the process key.
    #[error("Invalid signature")]
    BadSignature,

    /// The token is not a structurally valid signed token, or required claims are missing.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The stored expiry instant is in the past.
    #[error("Token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                VerificationError::BadSignature
            }
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            _ => VerificationError::Malformed(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing secret must be at least {0} bytes")]
    WeakSecret(usize),

    #[error("subject must not be empty")]
    EmptySubject,

    #[error("claim '{0}' is reserved")]
    ReservedClaim(String),

    #[error("ttl puts the expiry outside the representable range")]
    TtlOutOfRange,

    #[error("failed to sign token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// A freshly signed token together with the instants encoded in it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 tokens under a single fixed key.
///
/// There is no key rotation: a `kid` header and a key set would be needed for
/// that, and every outstanding token dies when the secret changes.
#[derive(Clone)]
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &Algorithm::HS256)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Signer {
    /// Creates a signer for `secret`, which must be at least [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8]) -> Result<Self, SignerError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SignerError::WeakSecret(MIN_SECRET_LEN));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expired means the stored instant has passed; no grace period.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Signs a token for `subject` that expires `ttl` from now.
    ///
    /// `extra` must not contain any of the registered claims this signer sets itself.
    pub fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Result<IssuedToken, SignerError> {
        if subject.is_empty() {
            return Err(SignerError::EmptySubject);
        }
        if let Some(name) = extra.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(SignerError::ReservedClaim(name.clone()));
        }

        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(SignerError::TtlOutOfRange)?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            extra,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verifies signature, structure, and expiry of `token` and returns its claims.
    ///
    /// Pure function of the token, the key, and the wall clock.
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.sub.is_empty() {
            return Err(VerificationError::Malformed("empty subject".into()));
        }
        Ok(claims)
    }
}
