//! Session and verification cache contract.
//!
//! The services only see the two traits below. Backends own the key layout and the
//! encoding of values, so callers work with `Session` and user ids, never raw bytes.
//! A missing key is reported as `Ok(None)`; `Err` always means the cache itself failed.

pub mod memory;
pub mod redis_cache;

use crate::error::CacheError;
use crate::models::{Session, TokenPurpose};
use async_trait::async_trait;
use std::time::Duration;

pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;

#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Writes the session, the user→session link and the access token record as one
    /// all-or-nothing batch.
    async fn put_session(
        &self,
        refresh_token: &str,
        session: &Session,
        refresh_ttl: Duration,
        access_ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn get_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError>;

    /// Atomically reads and deletes the session, so only one caller can ever obtain it.
    async fn take_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError>;

    async fn delete_session(&self, refresh_token: &str) -> Result<(), CacheError>;

    async fn delete_user_session_link(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<(), CacheError>;

    /// Returns the refresh token owning an access token id while that token is active.
    async fn get_access_token_owner(
        &self,
        access_token_id: &str,
    ) -> Result<Option<String>, CacheError>;

    async fn delete_access_token_record(&self, access_token_id: &str) -> Result<(), CacheError>;

    /// Increments the failed attempts counter, creating it if needed, and resets its TTL.
    async fn increment_blocking_counter(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<u32, CacheError>;

    /// Current failed attempts count, 0 when absent.
    async fn get_blocking_counter(&self, fingerprint: &str) -> Result<u32, CacheError>;

    async fn delete_blocking_counter(&self, fingerprint: &str) -> Result<(), CacheError>;
}

#[async_trait]
pub trait VerificationCache: Send + Sync {
    async fn put_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn get_verification_token_owner(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<i64>, CacheError>;

    async fn delete_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<(), CacheError>;
}

/// Key layout shared by every backend.
pub mod keys {
    use crate::models::TokenPurpose;

    pub fn session(refresh_token: &str) -> String {
        format!("session:{}", refresh_token)
    }

    pub fn user_session(user_id: &str, refresh_token: &str) -> String {
        format!("user_session:{}:{}", user_id, refresh_token)
    }

    pub fn access_token(access_token_id: &str) -> String {
        format!("access_token:{}", access_token_id)
    }

    pub fn blocking(fingerprint: &str) -> String {
        format!("auth_blocking:{}", fingerprint)
    }

    pub fn verification(purpose: TokenPurpose, token: &str) -> String {
        match purpose {
            TokenPurpose::EmailConfirm => format!("email_confirm:{}", token),
            TokenPurpose::PasswordReset => format!("password_reset:{}", token),
        }
    }
}

pub(crate) fn encode_session(session: &Session) -> Result<String, CacheError> {
    Ok(serde_json::to_string(session)?)
}

pub(crate) fn decode_session(raw: &str) -> Result<Session, CacheError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn decode_user_id(raw: &str) -> Result<i64, CacheError> {
    raw.parse()
        .map_err(|_| CacheError::Codec(format!("not a user id: {:?}", raw)))
}

pub(crate) fn decode_counter(raw: &str) -> Result<u32, CacheError> {
    raw.parse()
        .map_err(|_| CacheError::Codec(format!("not a counter: {:?}", raw)))
}
