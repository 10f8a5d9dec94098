use crate::error::AuthError;
use bcrypt::{hash, verify, DEFAULT_COST};

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    hash(password, cost)
        .map_err(|e| AuthError::PasswordHash(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AuthError> {
    verify(password, hashed_password)
        .map_err(|e| AuthError::PasswordHash(format!("Failed to verify password: {}", e)))
}
