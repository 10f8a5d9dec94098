//! User persistence consumed by the authentication and verification flows.

use crate::error::AuthError;
use crate::models::{NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;

    /// Inserts the user and returns its id.
    async fn create_user(&self, user: NewUser) -> Result<i64, AuthError>;

    async fn confirm_email(&self, id: i64) -> Result<(), AuthError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AuthError>;
}

/// `UserStore` backed by the `users` table in PostgreSQL.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, first_name, last_name, password_hash, is_email_confirmed \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, first_name, last_name, password_hash, is_email_confirmed \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<i64, AuthError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // `users.email` is the only unique column besides the key.
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                AuthError::EmailAlreadyRegistered
            } else {
                AuthError::from(e)
            }
        })?;

        Ok(id)
    }

    async fn confirm_email(&self, id: i64) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET is_email_confirmed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}

/// Process-local `UserStore`, used by tests and local tooling.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<i64, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_users<T>(
        &self,
        f: impl FnOnce(&mut HashMap<i64, User>) -> Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| AuthError::UserStore("user store lock poisoned".into()))?;
        f(&mut users)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.with_users(|users| Ok(users.values().find(|u| u.email == email).cloned()))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        self.with_users(|users| Ok(users.get(&id).cloned()))
    }

    async fn create_user(&self, user: NewUser) -> Result<i64, AuthError> {
        self.with_users(|users| {
            if users.values().any(|u| u.email == user.email) {
                return Err(AuthError::EmailAlreadyRegistered);
            }
            let id = users.keys().max().copied().unwrap_or(0) + 1;
            users.insert(
                id,
                User {
                    id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    password_hash: user.password_hash,
                    is_email_confirmed: false,
                },
            );
            Ok(id)
        })
    }

    async fn confirm_email(&self, id: i64) -> Result<(), AuthError> {
        self.with_users(|users| match users.get_mut(&id) {
            Some(user) => {
                user.is_email_confirmed = true;
                Ok(())
            }
            None => Err(AuthError::UserNotFound),
        })
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AuthError> {
        self.with_users(|users| match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(())
            }
            None => Err(AuthError::UserNotFound),
        })
    }
}
