use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user account as stored in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// bcrypt hash, never serialized into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_email_confirmed: bool,
}

/// Data required to insert a new user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}
