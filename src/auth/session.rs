//! Session lifecycle: creation, access token validation, refresh rotation, revocation.
//!
//! A session lives in the cache under its refresh token together with an access token
//! record keyed by the access token id. The record is the only proof that a signed
//! access token has not been rotated away or revoked; absence of every key means the
//! session was rotated, revoked or has expired.

use crate::auth::token::{Claims, TokenCodec};
use crate::cache::SessionCache;
use crate::error::AuthError;
use crate::models::{Session, TokenPair};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Lifetimes for the two halves of a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionLifetimes {
    pub access_token: Duration,
    pub refresh_token: Duration,
}

pub struct AuthorizationService {
    codec: TokenCodec,
    cache: Arc<dyn SessionCache>,
    lifetimes: SessionLifetimes,
}

impl AuthorizationService {
    /// The access token lifetime is capped at the refresh token lifetime so an access
    /// token record never outlives its session.
    pub fn new(codec: TokenCodec, cache: Arc<dyn SessionCache>, lifetimes: SessionLifetimes) -> Self {
        let lifetimes = SessionLifetimes {
            access_token: lifetimes.access_token.min(lifetimes.refresh_token),
            refresh_token: lifetimes.refresh_token,
        };
        Self {
            codec,
            cache,
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> SessionLifetimes {
        self.lifetimes
    }

    /// Mints a new access/refresh pair for `user_id` and stores the session atomically.
    pub async fn create_session(&self, user_id: &str) -> Result<TokenPair, AuthError> {
        let access_token_id = Uuid::new_v4().to_string();
        let access_token =
            self.codec
                .issue(user_id, &access_token_id, self.lifetimes.access_token)?;
        let refresh_token = Uuid::new_v4().to_string();

        let session = Session {
            user_id: user_id.to_string(),
            access_token_id,
        };
        self.cache
            .put_session(
                &refresh_token,
                &session,
                self.lifetimes.refresh_token,
                self.lifetimes.access_token,
            )
            .await
            .map_err(AuthError::SessionStore)?;

        log::debug!("Created session for user {}", user_id);
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verifies the token and checks that its session is still active.
    ///
    /// Codec failures are returned as-is so an expired token can be told apart from a
    /// malformed one; a well-formed token without a live record is `NotActiveAccessToken`.
    pub async fn validate_access_token(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.verify(access_token)?;

        match self.cache.get_access_token_owner(&claims.jti).await? {
            Some(_) => Ok(claims),
            None => Err(AuthError::NotActiveAccessToken),
        }
    }

    /// Rotates a session: the old refresh token is consumed and a new pair is minted.
    ///
    /// The old session is claimed with an atomic take, so of two concurrent refreshes
    /// with the same token only one proceeds. The cleanup deletes and the new mint are
    /// separate steps; if one fails after the take, the old session is gone and the
    /// caller has to sign in again.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let session = self
            .cache
            .take_session(refresh_token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let rotated = self.retire_rotated_session(refresh_token, &session).await;
        let result = match rotated {
            Ok(()) => self.create_session(&session.user_id).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            log::warn!(
                "Session of user {} was consumed but not replaced ({}); re-authentication required",
                session.user_id,
                e
            );
        }
        result
    }

    async fn retire_rotated_session(
        &self,
        refresh_token: &str,
        session: &Session,
    ) -> Result<(), AuthError> {
        self.cache
            .delete_user_session_link(&session.user_id, refresh_token)
            .await?;
        self.cache
            .delete_access_token_record(&session.access_token_id)
            .await?;
        Ok(())
    }

    /// Logs out the session an access token belongs to.
    ///
    /// The token must verify, but its own record is what gets looked up, so a token
    /// close to expiry can still log out. Each delete is independent; a failing delete
    /// is returned without retrying earlier ones.
    pub async fn revoke_session(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.codec.verify(access_token)?;

        let refresh_token = self
            .cache
            .get_access_token_owner(&claims.jti)
            .await?
            .ok_or(AuthError::NotActiveAccessToken)?;

        self.cache.delete_access_token_record(&claims.jti).await?;

        match self.cache.get_session(&refresh_token).await {
            Ok(Some(session)) => {
                self.cache
                    .delete_user_session_link(&session.user_id, &refresh_token)
                    .await?;
            }
            Ok(None) => log::debug!("Session for revoked token {} already expired", claims.jti),
            Err(e) => log::warn!("Skipping user session link cleanup: {}", e),
        }

        self.cache.delete_session(&refresh_token).await?;

        log::debug!("Revoked session of user {}", claims.sub);
        Ok(())
    }

    /// Reads claims without checking the validity window or the active record.
    pub fn get_access_token_claims(&self, access_token: &str) -> Result<Claims, AuthError> {
        Ok(self.codec.claims(access_token)?)
    }
}
