//!
//! # Error Handling
//!
//! Two layers of errors live here. `AuthError` (with its building blocks `TokenError`
//! and `CacheError`) is what the session, authentication and verification services
//! return; every variant is a distinct outcome a caller can match on. `AppError` is the
//! HTTP-facing error: it implements `actix_web::error::ResponseError` and is built from
//! `AuthError` (and `validator::ValidationErrors`) through `From`, so handlers can use `?`.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use validator::ValidationErrors;

/// Failures of the signed identity token codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token could not be signed, which only happens with a misconfigured key.
    #[error("failed to sign token: {0}")]
    Encoding(String),
    /// Signature and structure are fine but `exp` is in the past.
    #[error("token is expired")]
    Expired,
    /// Anything else: bad structure, bad signature, unexpected algorithm, not yet valid.
    #[error("token is not valid: {0}")]
    Malformed(String),
}

impl TokenError {
    /// Expired tokens are the one failure a client can recover from by refreshing.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// Failures of the TTL key-value cache. A missing key is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cached value could not be decoded: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> CacheError {
        CacheError::Unavailable(error.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> CacheError {
        CacheError::Codec(error.to_string())
    }
}

/// Outcomes of the session, authentication and verification services.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("access token is not active")]
    NotActiveAccessToken,
    #[error("session not found")]
    SessionNotFound,
    #[error("failed to store session: {0}")]
    SessionStore(CacheError),
    #[error("blocked due to exceeding the failed attempts limit")]
    BlockedByLimit,
    #[error("user not found")]
    UserNotFound,
    #[error("email already registered")]
    EmailAlreadyRegistered,
    #[error("wrong password")]
    WrongPassword,
    #[error("verification token not found or expired")]
    TokenNotFoundOrExpired,
    #[error("failed to store verification token: {0}")]
    TokenStore(CacheError),
    #[error("failed to generate random token: {0}")]
    Generation(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("user store error: {0}")]
    UserStore(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// True for the "expired access token" case, which callers answer with a refresh.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, AuthError::Token(e) if e.is_expired())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> AuthError {
        AuthError::UserStore(error.to_string())
    }
}

/// Represents all possible errors that can be returned from an HTTP handler.
///
/// Each variant corresponds to a response status, carrying a message that ends up
/// in the JSON body.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed, expired or revoked credentials (HTTP 401).
    Unauthorized(String),
    /// A malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// The requested resource was not found (HTTP 404).
    NotFound(String),
    /// The client exceeded the failed sign-in limit (HTTP 429).
    TooManyAttempts(String),
    /// An unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Input validation failed (HTTP 422 Unprocessable Entity).
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::TooManyAttempts(msg) => write!(f, "Too Many Attempts: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyAttempts(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let msg = match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::TooManyAttempts(msg)
            | AppError::InternalServerError(msg)
            | AppError::ValidationError(msg) => msg,
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": msg
        }))
    }
}

/// Maps service outcomes onto response classes.
///
/// Business rejections keep their message; infrastructure faults are logged here and
/// reach the client as a generic internal error.
impl From<AuthError> for AppError {
    fn from(error: AuthError) -> AppError {
        match error {
            AuthError::Token(TokenError::Encoding(msg)) => {
                log::error!("token signing failed: {}", msg);
                AppError::InternalServerError("Internal error".into())
            }
            AuthError::Token(e) => AppError::Unauthorized(e.to_string()),
            AuthError::NotActiveAccessToken | AuthError::SessionNotFound => {
                AppError::Unauthorized(error.to_string())
            }
            // Same message for both so responses do not reveal which emails exist.
            AuthError::UserNotFound | AuthError::WrongPassword => {
                AppError::Unauthorized("Invalid credentials".into())
            }
            AuthError::BlockedByLimit => AppError::TooManyAttempts(error.to_string()),
            AuthError::TokenNotFoundOrExpired => AppError::BadRequest(error.to_string()),
            AuthError::EmailAlreadyRegistered => {
                AppError::BadRequest("Email already registered".into())
            }
            AuthError::SessionStore(_)
            | AuthError::TokenStore(_)
            | AuthError::Cache(_)
            | AuthError::UserStore(_)
            | AuthError::Generation(_)
            | AuthError::PasswordHash(_) => {
                log::error!("{}", error);
                AppError::InternalServerError("Internal error".into())
            }
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}
