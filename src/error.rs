//!
//! # Custom Error Handling
//!
//! `AppError` is the single error type returned by HTTP handlers. It implements
//! `actix_web::error::ResponseError`, so every variant becomes a JSON body of the
//! form `{"error": "<message>"}` with the matching status code.
//!
//! Domain errors (`StoreError`, `SessionError`, `AccessError`) and library
//! errors (`sqlx`, `validator`, `bcrypt`) convert through `From`, which keeps
//! handlers on the `?` operator.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use log::error;
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

use crate::auth::guard::AccessError;
use crate::auth::session::SessionError;
use crate::store::StoreError;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or is required but missing (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but not allowed to touch this resource (HTTP 403).
    Forbidden(String),
    /// Malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// Requested resource was not found (HTTP 404).
    NotFound(String),
    /// The request collides with existing state, e.g. a taken email (HTTP 409).
    Conflict(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    DatabaseError(String),
    /// Failed input validation (HTTP 422 Unprocessable Entity).
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let msg = match self {
            // Server-side details stay in the log.
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                error!("{}", self);
                "Internal server error"
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ValidationError(msg) => msg.as_str(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "error": msg }))
    }
}

/// `RowNotFound` becomes a 404; everything else is a database error.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Conflict(what) => AppError::Conflict(format!("Already exists: {}", what)),
            StoreError::MissingReference(what) => {
                AppError::BadRequest(format!("Unknown reference: {}", what))
            }
            StoreError::Database(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> AppError {
        match error {
            SessionError::InvalidCredentials
            | SessionError::RefreshTokenNotFound
            | SessionError::RefreshTokenRevoked
            | SessionError::RefreshTokenExpired
            | SessionError::SignatureInvalid
            | SessionError::SubjectUnavailable => AppError::Unauthorized(error.to_string()),
            SessionError::Store(e) => e.into(),
            SessionError::Signing(_) | SessionError::Internal(_) => {
                AppError::InternalServerError(error.to_string())
            }
        }
    }
}

impl From<AccessError> for AppError {
    fn from(error: AccessError) -> AppError {
        match error {
            AccessError::Unauthenticated => AppError::Unauthorized(error.to_string()),
            AccessError::NotFound(_) => AppError::NotFound(error.to_string()),
            AccessError::Forbidden(_) => AppError::Forbidden(error.to_string()),
        }
    }
}
