use crate::auth::password::verify_password;
use crate::cache::SessionCache;
use crate::error::AuthError;
use crate::users::UserStore;
use std::sync::Arc;
use std::time::Duration;

/// Brute-force lockout settings. Counters are kept per client fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct BlockingPolicy {
    /// Failed attempts after which the fingerprint is refused.
    pub max_errors: u32,
    /// How long a counter lives after its last failed attempt.
    pub lifetime: Duration,
}

/// Checks credentials and enforces the failed attempts limit.
pub struct AuthenticationService {
    users: Arc<dyn UserStore>,
    cache: Arc<dyn SessionCache>,
    policy: BlockingPolicy,
}

impl AuthenticationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        cache: Arc<dyn SessionCache>,
        policy: BlockingPolicy,
    ) -> Self {
        Self {
            users,
            cache,
            policy,
        }
    }

    /// Returns the user id when `password` matches the account registered for `email`.
    ///
    /// A blocked fingerprint is rejected before the user store or the password hash is
    /// touched. A wrong password bumps the fingerprint's counter; a correct one clears it.
    pub async fn authenticate_by_email(
        &self,
        email: &str,
        password: &str,
        fingerprint: &str,
    ) -> Result<i64, AuthError> {
        self.check_blocking(fingerprint).await?;

        let user = self
            .users
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash)? {
            if let Err(e) = self
                .cache
                .increment_blocking_counter(fingerprint, self.policy.lifetime)
                .await
            {
                log::error!("Failed to count failed sign-in attempt: {}", e);
            }
            return Err(AuthError::WrongPassword);
        }

        if let Err(e) = self.cache.delete_blocking_counter(fingerprint).await {
            log::error!("Failed to reset failed sign-in attempts: {}", e);
        }

        Ok(user.id)
    }

    async fn check_blocking(&self, fingerprint: &str) -> Result<(), AuthError> {
        let count = self.cache.get_blocking_counter(fingerprint).await?;
        if count >= self.policy.max_errors {
            log::warn!("Sign-in refused for blocked fingerprint ({} failures)", count);
            return Err(AuthError::BlockedByLimit);
        }
        Ok(())
    }
}
