//! Cache contract checks against a live Redis.
//!
//! Run with `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_cache -- --ignored`.
//! GETDEL needs Redis 6.2 or newer.

use pretty_assertions::assert_eq;
use std::time::Duration;
use uuid::Uuid;

use task_tracker::cache::{RedisCache, SessionCache, VerificationCache};
use task_tracker::models::{Session, TokenPurpose};

async fn connect() -> RedisCache {
    dotenv::dotenv().ok();
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for redis tests");
    RedisCache::connect(&url, Duration::from_secs(2))
        .await
        .expect("Failed to connect to redis")
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[ignore]
#[actix_rt::test]
async fn test_session_write_take_and_cleanup() {
    let cache = connect().await;
    let refresh_token = unique("rt");
    let session = Session {
        user_id: unique("user"),
        access_token_id: unique("at"),
    };

    cache
        .put_session(
            &refresh_token,
            &session,
            Duration::from_secs(60),
            Duration::from_secs(30),
        )
        .await
        .unwrap();

    assert_eq!(
        cache.get_session(&refresh_token).await.unwrap(),
        Some(session.clone())
    );
    assert_eq!(
        cache
            .get_access_token_owner(&session.access_token_id)
            .await
            .unwrap(),
        Some(refresh_token.clone())
    );

    assert_eq!(
        cache.take_session(&refresh_token).await.unwrap(),
        Some(session.clone())
    );
    assert_eq!(cache.take_session(&refresh_token).await.unwrap(), None);

    cache
        .delete_user_session_link(&session.user_id, &refresh_token)
        .await
        .unwrap();
    cache
        .delete_access_token_record(&session.access_token_id)
        .await
        .unwrap();
    assert_eq!(
        cache
            .get_access_token_owner(&session.access_token_id)
            .await
            .unwrap(),
        None
    );
}

#[ignore]
#[actix_rt::test]
async fn test_blocking_counter() {
    let cache = connect().await;
    let fingerprint = unique("fp");

    assert_eq!(cache.get_blocking_counter(&fingerprint).await.unwrap(), 0);
    for expected in 1..=3 {
        let count = cache
            .increment_blocking_counter(&fingerprint, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(count, expected);
    }
    assert_eq!(cache.get_blocking_counter(&fingerprint).await.unwrap(), 3);

    cache.delete_blocking_counter(&fingerprint).await.unwrap();
    assert_eq!(cache.get_blocking_counter(&fingerprint).await.unwrap(), 0);
}

#[ignore]
#[actix_rt::test]
async fn test_verification_tokens_expire() {
    let cache = connect().await;
    let token = unique("ec");

    cache
        .put_verification_token(TokenPurpose::EmailConfirm, &token, 42, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        cache
            .get_verification_token_owner(TokenPurpose::EmailConfirm, &token)
            .await
            .unwrap(),
        Some(42)
    );
    assert_eq!(
        cache
            .get_verification_token_owner(TokenPurpose::PasswordReset, &token)
            .await
            .unwrap(),
        None
    );

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        cache
            .get_verification_token_owner(TokenPurpose::EmailConfirm, &token)
            .await
            .unwrap(),
        None
    );
}
