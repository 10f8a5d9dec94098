use super::{
    decode_counter, decode_session, decode_user_id, encode_session, keys, SessionCache,
    VerificationCache,
};
use crate::error::CacheError;
use crate::models::{Session, TokenPurpose};
use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Upper bound on stored keys; least recently used keys go first when it is reached.
const MAX_ENTRIES: u64 = 1_000_000;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

impl Entry {
    fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            ttl,
        }
    }
}

/// Each key lives for the TTL it was last written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Process-local TTL cache implementing the full cache contract.
///
/// Entries live in a `moka` cache that drops them once their TTL has passed, whether
/// or not they are read again. Multi-key writes and read-modify-write operations take
/// the write side of `gate`; single reads take the read side, so no reader ever sees
/// half of a session batch.
pub struct InMemoryCache {
    entries: Cache<String, Entry>,
    gate: RwLock<()>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
            gate: RwLock::new(()),
        }
    }

    /// Keys that have not expired yet, sorted.
    pub fn live_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        keys
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ()>, CacheError> {
        self.gate
            .read()
            .map_err(|_| CacheError::Unavailable("in-memory cache lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ()>, CacheError> {
        self.gate
            .write()
            .map_err(|_| CacheError::Unavailable("in-memory cache lock poisoned".into()))
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let _guard = self.read()?;
        Ok(self.entries.get(key).map(|entry| entry.value))
    }

    fn take(&self, key: &str) -> Result<Option<String>, CacheError> {
        let _guard = self.write()?;
        let value = self.entries.get(key).map(|entry| entry.value);
        self.entries.invalidate(key);
        Ok(value)
    }

    fn set(&self, key: String, value: String, ttl: Duration) -> Result<(), CacheError> {
        let _guard = self.read()?;
        self.entries.insert(key, Entry::new(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.read()?;
        self.entries.invalidate(key);
        Ok(())
    }
}

#[async_trait]
impl SessionCache for InMemoryCache {
    async fn put_session(
        &self,
        refresh_token: &str,
        session: &Session,
        refresh_ttl: Duration,
        access_ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = encode_session(session)?;
        let _guard = self.write()?;
        self.entries
            .insert(keys::session(refresh_token), Entry::new(value, refresh_ttl));
        self.entries.insert(
            keys::user_session(&session.user_id, refresh_token),
            Entry::new(session.access_token_id.as_str(), refresh_ttl),
        );
        self.entries.insert(
            keys::access_token(&session.access_token_id),
            Entry::new(refresh_token, access_ttl),
        );
        Ok(())
    }

    async fn get_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError> {
        self.get(&keys::session(refresh_token))?
            .map(|raw| decode_session(&raw))
            .transpose()
    }

    async fn take_session(&self, refresh_token: &str) -> Result<Option<Session>, CacheError> {
        self.take(&keys::session(refresh_token))?
            .map(|raw| decode_session(&raw))
            .transpose()
    }

    async fn delete_session(&self, refresh_token: &str) -> Result<(), CacheError> {
        self.delete(&keys::session(refresh_token))
    }

    async fn delete_user_session_link(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<(), CacheError> {
        self.delete(&keys::user_session(user_id, refresh_token))
    }

    async fn get_access_token_owner(
        &self,
        access_token_id: &str,
    ) -> Result<Option<String>, CacheError> {
        self.get(&keys::access_token(access_token_id))
    }

    async fn delete_access_token_record(&self, access_token_id: &str) -> Result<(), CacheError> {
        self.delete(&keys::access_token(access_token_id))
    }

    async fn increment_blocking_counter(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<u32, CacheError> {
        let key = keys::blocking(fingerprint);
        let _guard = self.write()?;
        let current = match self.entries.get(&key) {
            Some(entry) => decode_counter(&entry.value)?,
            None => 0,
        };
        let count = current.saturating_add(1);
        self.entries.insert(key, Entry::new(count.to_string(), ttl));
        Ok(count)
    }

    async fn get_blocking_counter(&self, fingerprint: &str) -> Result<u32, CacheError> {
        match self.get(&keys::blocking(fingerprint))? {
            Some(raw) => decode_counter(&raw),
            None => Ok(0),
        }
    }

    async fn delete_blocking_counter(&self, fingerprint: &str) -> Result<(), CacheError> {
        self.delete(&keys::blocking(fingerprint))
    }
}

#[async_trait]
impl VerificationCache for InMemoryCache {
    async fn put_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.set(keys::verification(purpose, token), user_id.to_string(), ttl)
    }

    async fn get_verification_token_owner(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<i64>, CacheError> {
        self.get(&keys::verification(purpose, token))?
            .map(|raw| decode_user_id(&raw))
            .transpose()
    }

    async fn delete_verification_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<(), CacheError> {
        self.delete(&keys::verification(purpose, token))
    }
}
