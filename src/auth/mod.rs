pub mod extractors;
pub mod guard;
pub mod ledger;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod session;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use extractors::{Authenticated, MaybeAuthenticated};
pub use guard::{authorize, AccessError, Owned};
pub use ledger::{LedgerEntry, NewLedgerEntry, TokenKind, TokenLedger};
pub use middleware::{AuthMiddleware, Authenticator};
pub use password::{hash_password, verify_password};
pub use principal::Principal;
pub use session::{SessionConfig, SessionError, SessionService, TokenPair};
pub use token::{Claims, Signer, SignerError, VerificationError};

lazy_static! {
    // Letters, spaces, apostrophes and hyphens; must start with a letter.
    static ref NAME_REGEX: regex::Regex = regex::Regex::new(r"^\p{L}[\p{L} '\-]*$").unwrap();
}

/// Emails are compared and stored lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 2, max = 30),
        regex(path = "NAME_REGEX", message = "Names may contain letters, spaces, apostrophes, and hyphens")
    )]
    pub first_name: String,
    #[validate(
        length(min = 2, max = 60),
        regex(path = "NAME_REGEX", message = "Names may contain letters, spaces, apostrophes, and hyphens")
    )]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    /// bcrypt only looks at the first 72 bytes.
    #[validate(length(min = 8, max = 72))]
    pub password: String,
}

/// Successful login: a short-lived access token and a long-lived refresh token.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
}

/// `refreshToken` is optional so a missing field can be answered with 404.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}
