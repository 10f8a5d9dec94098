use serde::{Deserialize, Serialize};
use std::fmt;

/// A live session, stored in the cache under its refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token_id: String,
}

/// Access/refresh token pair handed to the client after sign-in or rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// What a one-time verification token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    EmailConfirm,
    PasswordReset,
}

impl TokenPurpose {
    /// Prefix prepended to the random part of the token handed to the user.
    pub fn token_prefix(self) -> &'static str {
        match self {
            TokenPurpose::EmailConfirm => "ec",
            TokenPurpose::PasswordReset => "rpc",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenPurpose::EmailConfirm => write!(f, "email confirmation"),
            TokenPurpose::PasswordReset => write!(f, "password reset"),
        }
    }
}
