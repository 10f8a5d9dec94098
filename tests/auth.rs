use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use task_tracker::auth::password::hash_password_with_cost;
use task_tracker::auth::{
    AlphanumericGenerator, AuthenticationService, AuthorizationService, BlockingPolicy,
    SessionLifetimes, TokenCodec, TokenPolicy, VerificationLifetimes, VerificationService,
};
use task_tracker::cache::InMemoryCache;
use task_tracker::error::{AuthError, TokenError};
use task_tracker::models::NewUser;
use task_tracker::users::{InMemoryUserStore, UserStore};

const SECRET: &str = "integration-test-signing-key-0123456789";
const PASSWORD: &str = "correct horse";
const MAX_ERRORS: u32 = 3;
// Lowest cost bcrypt accepts.
const TEST_COST: u32 = 4;

struct Services {
    authorization: AuthorizationService,
    authentication: AuthenticationService,
    verification: VerificationService,
    cache: Arc<InMemoryCache>,
    user_id: i64,
}

async fn services() -> Services {
    let cache = Arc::new(InMemoryCache::new());
    let users = Arc::new(InMemoryUserStore::new());
    let user_id = users
        .create_user(NewUser {
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password_hash: hash_password_with_cost(PASSWORD, TEST_COST).unwrap(),
        })
        .await
        .unwrap();

    Services {
        authorization: AuthorizationService::new(
            TokenCodec::new(SECRET),
            cache.clone(),
            SessionLifetimes {
                access_token: Duration::from_secs(300),
                refresh_token: Duration::from_secs(3600),
            },
        ),
        authentication: AuthenticationService::new(
            users,
            cache.clone(),
            BlockingPolicy {
                max_errors: MAX_ERRORS,
                lifetime: Duration::from_secs(600),
            },
        ),
        verification: VerificationService::new(
            cache.clone(),
            Arc::new(AlphanumericGenerator),
            TokenPolicy::default(),
            VerificationLifetimes {
                email_confirm: Duration::from_secs(3600),
                password_reset: Duration::from_secs(600),
            },
        ),
        cache,
        user_id,
    }
}

#[test_log::test(actix_rt::test)]
async fn test_created_session_validates_to_its_subject() {
    let s = services().await;
    for user_id in ["1", "42", "c0ffee"] {
        let tokens = s.authorization.create_session(user_id).await.unwrap();
        let claims = s
            .authorization
            .validate_access_token(&tokens.access_token)
            .await
            .unwrap();
        assert_eq!(claims.sub, user_id);
    }
}

#[test_log::test(actix_rt::test)]
async fn test_rotation_scenario_for_user_42() {
    let s = services().await;
    let first = s.authorization.create_session("42").await.unwrap();

    let second = s
        .authorization
        .refresh_session(&first.refresh_token)
        .await
        .unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_ne!(first.access_token, second.access_token);

    assert!(matches!(
        s.authorization.refresh_session(&first.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
    assert!(matches!(
        s.authorization
            .validate_access_token(&first.access_token)
            .await,
        Err(AuthError::NotActiveAccessToken)
    ));

    let claims = s
        .authorization
        .validate_access_token(&second.access_token)
        .await
        .unwrap();
    assert_eq!(claims.sub, "42");

    // Only the rotated session's three keys remain.
    assert_eq!(s.cache.live_keys().len(), 3);
}

#[test_log::test(actix_rt::test)]
async fn test_concurrent_refresh_has_one_winner() {
    let s = services().await;
    let tokens = s.authorization.create_session("42").await.unwrap();

    let (a, b) = futures::join!(
        s.authorization.refresh_session(&tokens.refresh_token),
        s.authorization.refresh_session(&tokens.refresh_token)
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert!(
        matches!(a, Err(AuthError::SessionNotFound)) || matches!(b, Err(AuthError::SessionNotFound))
    );
}

#[test_log::test(actix_rt::test)]
async fn test_revoked_token_is_not_active_while_signature_is_valid() {
    let s = services().await;
    let tokens = s.authorization.create_session("7").await.unwrap();

    s.authorization
        .revoke_session(&tokens.access_token)
        .await
        .unwrap();

    assert!(matches!(
        s.authorization
            .validate_access_token(&tokens.access_token)
            .await,
        Err(AuthError::NotActiveAccessToken)
    ));
    // Still a well-formed, unexpired token.
    let claims = s
        .authorization
        .get_access_token_claims(&tokens.access_token)
        .unwrap();
    assert_eq!(claims.sub, "7");
    assert!(matches!(
        s.authorization.refresh_session(&tokens.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
    assert!(s.cache.live_keys().is_empty());
}

#[test_log::test(actix_rt::test)]
async fn test_token_from_another_key_is_rejected() {
    let s = services().await;
    let forged = TokenCodec::new("some-other-signing-key")
        .issue("42", "made-up-id", Duration::from_secs(60))
        .unwrap();

    assert!(matches!(
        s.authorization.validate_access_token(&forged).await,
        Err(AuthError::Token(TokenError::Malformed(_)))
    ));
}

#[test_log::test(actix_rt::test)]
async fn test_lockout_after_max_errors_then_correct_password() {
    let s = services().await;
    for _ in 0..MAX_ERRORS {
        assert!(matches!(
            s.authentication
                .authenticate_by_email("ada@example.com", "wrong", "fp-1")
                .await,
            Err(AuthError::WrongPassword)
        ));
    }

    assert!(matches!(
        s.authentication
            .authenticate_by_email("ada@example.com", PASSWORD, "fp-1")
            .await,
        Err(AuthError::BlockedByLimit)
    ));
}

#[test_log::test(actix_rt::test)]
async fn test_success_resets_blocking_counter() {
    let s = services().await;
    for _ in 0..MAX_ERRORS - 1 {
        let _ = s
            .authentication
            .authenticate_by_email("ada@example.com", "wrong", "fp-2")
            .await;
    }
    let user_id = s
        .authentication
        .authenticate_by_email("ada@example.com", PASSWORD, "fp-2")
        .await
        .unwrap();
    assert_eq!(user_id, s.user_id);

    assert!(matches!(
        s.authentication
            .authenticate_by_email("ada@example.com", "wrong", "fp-2")
            .await,
        Err(AuthError::WrongPassword)
    ));
    assert!(s
        .authentication
        .authenticate_by_email("ada@example.com", PASSWORD, "fp-2")
        .await
        .is_ok());
}

#[test_log::test(actix_rt::test)]
async fn test_sign_in_then_session_flow() {
    let s = services().await;
    let user_id = s
        .authentication
        .authenticate_by_email("ada@example.com", PASSWORD, "fp-3")
        .await
        .unwrap();
    let tokens = s
        .authorization
        .create_session(&user_id.to_string())
        .await
        .unwrap();

    let claims = s
        .authorization
        .validate_access_token(&tokens.access_token)
        .await
        .unwrap();
    assert_eq!(claims.sub, s.user_id.to_string());
}

#[test_log::test(actix_rt::test)]
async fn test_verification_tokens_are_single_use() {
    let s = services().await;

    let token = s
        .verification
        .create_email_confirm_token(s.user_id)
        .await
        .unwrap();
    assert_eq!(
        s.verification.verify_email_confirm_token(&token).await.unwrap(),
        s.user_id
    );
    assert!(matches!(
        s.verification.verify_email_confirm_token(&token).await,
        Err(AuthError::TokenNotFoundOrExpired)
    ));

    let token = s
        .verification
        .create_password_reset_token(s.user_id)
        .await
        .unwrap();
    assert_eq!(
        s.verification.verify_password_reset_token(&token).await.unwrap(),
        s.user_id
    );
    assert!(matches!(
        s.verification.verify_password_reset_token(&token).await,
        Err(AuthError::TokenNotFoundOrExpired)
    ));
}

#[test_log::test(actix_rt::test)]
async fn test_verification_tokens_expire() {
    let cache = Arc::new(InMemoryCache::new());
    let verification = VerificationService::new(
        cache,
        Arc::new(AlphanumericGenerator),
        TokenPolicy::default(),
        VerificationLifetimes {
            email_confirm: Duration::from_millis(50),
            password_reset: Duration::from_millis(50),
        },
    );
    let token = verification.create_email_confirm_token(1).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(
        verification.verify_email_confirm_token(&token).await,
        Err(AuthError::TokenNotFoundOrExpired)
    ));
}
