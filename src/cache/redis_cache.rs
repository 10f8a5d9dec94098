use super::{
    decode_counter, decode_session, decode_user_id, encode_session, keys, SessionCache,
    VerificationCache,
};
use crate::error::CacheError;
use crate::models::{Session, TokenPurpose};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::future::Future;
use std::time::Duration;

/// Redis backend for the cache contract.
///
/// The connection manager reconnects on its own; every command is bounded by
/// `timeout` and a timeout surfaces as `CacheError::Unavailable`.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Unavailable("timed out connecting to redis".into()))??;

        log::info!("Connected to redis cache");
        Ok(Self {
            connection,
            timeout,
        })
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, CacheError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| CacheError::Unavailable("redis operation timed out".into()))?
            .map_err(CacheError::from)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value = self
            .run(redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.run(redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn))
            .await?;
        Ok(())
    }
}

// Redis rejects `EX 0`, so sub-second TTLs round up to one second.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn put_session(
        &self,
        refresh_token: &str,
        session: &Session,
        refresh_ttl: Duration,
        access_ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = encode_session(session)?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(keys::session(refresh_token))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(refresh_ttl))
            .ignore()
            .cmd("SET")
            .arg(keys::user_session(&session.user_id, refresh_token))
            .arg(&session.access_token_id)
            .arg("EX")
            .arg(ttl_secs(refresh_ttl))
            .ignore()
            .cmd("SET")
            .arg(keys::access_token(&session.access_token_id))
            .arg(refresh_token)
            .arg("EX")
            .arg(ttl_secs(access_ttl))
            .ignore();

        let mut conn = self.connection.clone();
        self.run(pipe.query_async::<_, ()>(&mut conn)).await?;
        Ok(())
    }

    async fn get_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError> {
        self.get(&keys::session(refresh_token))
            .await?
            .map(|raw| decode_session(&raw))
            .transpose()
    }

    async fn take_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = self
            .run(
                redis::cmd("GETDEL")
                    .arg(keys::session(refresh_token))
                    .query_async(&mut conn),
            )
            .await?;
        raw.map(|raw| decode_session(&raw)).transpose()
    }

    async fn delete_session(&self, refresh_token: &str) -> Result<(), CacheError> {
        self.delete(&keys::session(refresh_token)).await
    }

    async fn delete_user_session_link(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<(), CacheError> {
        self.delete(&keys::user_session(user_id, refresh_token))
            .await
    }

    async fn get_access_token_owner(
        &self,
        access_token_id: &str,
    ) -> Result<Option<String>, CacheError> {
        self.get(&keys::access_token(access_token_id)).await
    }

    async fn delete_access_token_record(&self, access_token_id: &str) -> Result<(), CacheError> {
        self.delete(&keys::access_token(access_token_id)).await
    }

    async fn increment_blocking_counter(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<u32, CacheError> {
        let key = keys::blocking(fingerprint);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl_secs(ttl))
            .ignore();

        let mut conn = self.connection.clone();
        let (count,): (u32,) = self.run(pipe.query_async(&mut conn)).await?;
        Ok(count)
    }

    async fn get_blocking_counter(&self, fingerprint: &str) -> Result<u32, CacheError> {
        match self.get(&keys::blocking(fingerprint)).await? {
            Some(raw) => decode_counter(&raw),
            None => Ok(0),
        }
    }

    async fn delete_blocking_counter(&self, fingerprint: &str) -> Result<(), CacheError> {
        self.delete(&keys::blocking(fingerprint)).await
    }
}

#[async_trait]
impl VerificationCache for RedisCache {
    async fn put_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.run(
            redis::cmd("SET")
                .arg(keys::verification(purpose, token))
                .arg(user_id)
                .arg("EX")
                .arg(ttl_secs(ttl))
                .query_async::<_, ()>(&mut conn),
        )
        .await?;
        Ok(())
    }

    async fn get_verification_token_owner(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<i64>, CacheError> {
        self.get(&keys::verification(purpose, token))
            .await?
            .map(|raw| decode_user_id(&raw))
            .transpose()
    }

    async fn delete_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<(), CacheError> {
        self.delete(&keys::verification(purpose, token)).await
    }
}
