//! One-time verification tokens for email confirmation and password reset.

use crate::cache::VerificationCache;
use crate::error::AuthError;
use crate::models::TokenPurpose;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const LOWER_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

/// Shape of a generated random token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub length: usize,
    /// Exact number of digits in the token.
    pub digits: usize,
    /// Exact number of symbols in the token.
    pub symbols: usize,
    pub no_upper: bool,
    pub allow_repeat: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            length: 24,
            digits: 8,
            symbols: 0,
            no_upper: false,
            allow_repeat: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

pub trait RandomTokenGenerator: Send + Sync {
    fn generate(&self, policy: &TokenPolicy) -> Result<String, GenerationError>;
}

/// Generator drawing from the thread-local CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlphanumericGenerator;

impl RandomTokenGenerator for AlphanumericGenerator {
    fn generate(&self, policy: &TokenPolicy) -> Result<String, GenerationError> {
        let fixed = policy.digits + policy.symbols;
        if fixed > policy.length {
            return Err(GenerationError(format!(
                "{} digits and {} symbols do not fit in {} characters",
                policy.digits, policy.symbols, policy.length
            )));
        }

        let letters: Vec<u8> = if policy.no_upper {
            LOWER_LETTERS.to_vec()
        } else {
            [LOWER_LETTERS, UPPER_LETTERS].concat()
        };

        let mut rng = rand::thread_rng();
        let mut token = Vec::with_capacity(policy.length);
        token.extend(pick(&mut rng, DIGITS, policy.digits, policy.allow_repeat)?);
        token.extend(pick(&mut rng, SYMBOLS, policy.symbols, policy.allow_repeat)?);
        token.extend(pick(
            &mut rng,
            &letters,
            policy.length - fixed,
            policy.allow_repeat,
        )?);
        token.shuffle(&mut rng);

        String::from_utf8(token).map_err(|e| GenerationError(e.to_string()))
    }
}

fn pick<R: Rng>(
    rng: &mut R,
    alphabet: &[u8],
    count: usize,
    allow_repeat: bool,
) -> Result<Vec<u8>, GenerationError> {
    if allow_repeat {
        return Ok((0..count)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect());
    }
    if count > alphabet.len() {
        return Err(GenerationError(format!(
            "cannot pick {} distinct characters from {}",
            count,
            alphabet.len()
        )));
    }
    Ok(alphabet.choose_multiple(rng, count).copied().collect())
}

/// Token lifetimes per purpose.
#[derive(Debug, Clone, Copy)]
pub struct VerificationLifetimes {
    pub email_confirm: Duration,
    pub password_reset: Duration,
}

pub struct VerificationService {
    cache: Arc<dyn VerificationCache>,
    generator: Arc<dyn RandomTokenGenerator>,
    policy: TokenPolicy,
    lifetimes: VerificationLifetimes,
}

impl VerificationService {
    pub fn new(
        cache: Arc<dyn VerificationCache>,
        generator: Arc<dyn RandomTokenGenerator>,
        policy: TokenPolicy,
        lifetimes: VerificationLifetimes,
    ) -> Self {
        Self {
            cache,
            generator,
            policy,
            lifetimes,
        }
    }

    pub async fn create_email_confirm_token(&self, user_id: i64) -> Result<String, AuthError> {
        self.create_token(TokenPurpose::EmailConfirm, user_id).await
    }

    pub async fn create_password_reset_token(&self, user_id: i64) -> Result<String, AuthError> {
        self.create_token(TokenPurpose::PasswordReset, user_id)
            .await
    }

    pub async fn verify_email_confirm_token(&self, token: &str) -> Result<i64, AuthError> {
        self.consume_token(TokenPurpose::EmailConfirm, token).await
    }

    pub async fn verify_password_reset_token(&self, token: &str) -> Result<i64, AuthError> {
        self.consume_token(TokenPurpose::PasswordReset, token)
            .await
    }

    fn lifetime(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::EmailConfirm => self.lifetimes.email_confirm,
            TokenPurpose::PasswordReset => self.lifetimes.password_reset,
        }
    }

    async fn create_token(&self, purpose: TokenPurpose, user_id: i64) -> Result<String, AuthError> {
        let random = self
            .generator
            .generate(&self.policy)
            .map_err(|e| AuthError::Generation(e.to_string()))?;
        let token = format!("{}{}", purpose.token_prefix(), random);

        self.cache
            .put_verification_token(purpose, &token, user_id, self.lifetime(purpose))
            .await
            .map_err(AuthError::TokenStore)?;

        Ok(token)
    }

    // The token is deleted once read; a failed delete is only logged since the
    // lookup already succeeded.
    async fn consume_token(&self, purpose: TokenPurpose, token: &str) -> Result<i64, AuthError> {
        let user_id = self
            .cache
            .get_verification_token_owner(purpose, token)
            .await?
            .ok_or(AuthError::TokenNotFoundOrExpired)?;

        if let Err(e) = self.cache.delete_verification_token(purpose, token).await {
            log::error!("Failed to delete {} token: {}", purpose, e);
        }

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mocks::{unavailable, MockVerificationStore};
    use crate::cache::InMemoryCache;
    use crate::error::CacheError;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    struct FailingGenerator;

    impl RandomTokenGenerator for FailingGenerator {
        fn generate(&self, _policy: &TokenPolicy) -> Result<String, GenerationError> {
            Err(GenerationError("entropy exhausted".into()))
        }
    }

    fn service_with(cache: Arc<dyn VerificationCache>) -> VerificationService {
        VerificationService::new(
            cache,
            Arc::new(AlphanumericGenerator),
            TokenPolicy::default(),
            VerificationLifetimes {
                email_confirm: Duration::from_secs(3600),
                password_reset: Duration::from_secs(600),
            },
        )
    }

    fn service() -> VerificationService {
        service_with(Arc::new(InMemoryCache::new()))
    }

    #[test]
    fn test_default_policy_shape() {
        let token = AlphanumericGenerator
            .generate(&TokenPolicy::default())
            .unwrap();

        assert_eq!(token.len(), 24);
        assert_eq!(token.chars().filter(|c| c.is_ascii_digit()).count(), 8);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        let distinct: HashSet<char> = token.chars().collect();
        assert_eq!(distinct.len(), 24);
    }

    #[test]
    fn test_lowercase_policy_with_symbols() {
        let policy = TokenPolicy {
            length: 12,
            digits: 2,
            symbols: 2,
            no_upper: true,
            allow_repeat: true,
        };
        let token = AlphanumericGenerator.generate(&policy).unwrap();

        assert_eq!(token.len(), 12);
        assert!(!token.chars().any(|c| c.is_ascii_uppercase()));
        assert_eq!(token.chars().filter(|c| SYMBOLS.contains(&(*c as u8))).count(), 2);
    }

    #[test]
    fn test_impossible_policies_fail() {
        let too_many_fixed = TokenPolicy {
            length: 4,
            digits: 3,
            symbols: 2,
            ..TokenPolicy::default()
        };
        assert!(AlphanumericGenerator.generate(&too_many_fixed).is_err());

        let too_many_distinct_digits = TokenPolicy {
            length: 20,
            digits: 11,
            ..TokenPolicy::default()
        };
        assert!(AlphanumericGenerator.generate(&too_many_distinct_digits).is_err());
    }

    #[actix_rt::test]
    async fn test_email_confirm_token_is_single_use() {
        let svc = service();
        let token = svc.create_email_confirm_token(42).await.unwrap();
        assert!(token.starts_with(TokenPurpose::EmailConfirm.token_prefix()));

        assert_eq!(svc.verify_email_confirm_token(&token).await.unwrap(), 42);
        assert!(matches!(
            svc.verify_email_confirm_token(&token).await,
            Err(AuthError::TokenNotFoundOrExpired)
        ));
    }

    #[actix_rt::test]
    async fn test_tokens_do_not_cross_purposes() {
        let svc = service();
        let token = svc.create_password_reset_token(7).await.unwrap();

        assert!(matches!(
            svc.verify_email_confirm_token(&token).await,
            Err(AuthError::TokenNotFoundOrExpired)
        ));
        assert_eq!(svc.verify_password_reset_token(&token).await.unwrap(), 7);
    }

    #[actix_rt::test]
    async fn test_generator_failure() {
        let svc = VerificationService::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(FailingGenerator),
            TokenPolicy::default(),
            VerificationLifetimes {
                email_confirm: Duration::from_secs(60),
                password_reset: Duration::from_secs(60),
            },
        );

        assert!(matches!(
            svc.create_email_confirm_token(1).await,
            Err(AuthError::Generation(_))
        ));
    }

    #[actix_rt::test]
    async fn test_store_failure_on_create() {
        let mut cache = MockVerificationStore::new();
        cache
            .expect_put_verification_token()
            .times(1)
            .returning(|purpose, _, user_id, ttl| {
                assert_eq!(purpose, TokenPurpose::PasswordReset);
                assert_eq!(user_id, 7);
                assert_eq!(ttl, Duration::from_secs(600));
                Err(unavailable())
            });
        let svc = service_with(Arc::new(cache));

        assert!(matches!(
            svc.create_password_reset_token(7).await,
            Err(AuthError::TokenStore(CacheError::Unavailable(_)))
        ));
    }

    #[actix_rt::test]
    async fn test_lookup_failure_is_not_reported_as_missing_token() {
        let mut cache = MockVerificationStore::new();
        cache
            .expect_get_verification_token_owner()
            .returning(|_, _| Err(unavailable()));
        cache.expect_delete_verification_token().times(0);
        let svc = service_with(Arc::new(cache));

        assert!(matches!(
            svc.verify_email_confirm_token("ecabc").await,
            Err(AuthError::Cache(CacheError::Unavailable(_)))
        ));
    }

    #[actix_rt::test]
    async fn test_failed_delete_after_lookup_still_verifies() {
        let mut cache = MockVerificationStore::new();
        cache
            .expect_get_verification_token_owner()
            .times(1)
            .returning(|_, _| Ok(Some(7)));
        cache
            .expect_delete_verification_token()
            .times(1)
            .returning(|_, _| Err(unavailable()));
        let svc = service_with(Arc::new(cache));

        assert_eq!(svc.verify_email_confirm_token("ecabc").await.unwrap(), 7);
    }
}
