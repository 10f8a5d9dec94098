use crate::error::TokenError;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Represents the claims encoded within an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token, the user's identifier.
    pub sub: String,
    /// Unique id of this issuance; links the token to its cache record.
    pub jti: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Not-before timestamp (seconds since epoch).
    pub nbf: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Issues and verifies HMAC-signed, time-bounded identity tokens.
#[derive(Clone)]
pub struct TokenCodec {
    signing_key: Vec<u8>,
}

impl TokenCodec {
    pub fn new(signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_key: signing_key.into(),
        }
    }

    /// Signs a token for `subject` with id `token_id`, valid from now for `lifetime`.
    ///
    /// Returns `TokenError::Encoding` if the signing key is empty or signing fails.
    pub fn issue(
        &self,
        subject: &str,
        token_id: &str,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        if self.signing_key.is_empty() {
            return Err(TokenError::Encoding("signing key is empty".into()));
        }

        let now = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(lifetime.as_secs())
            .map_err(|_| TokenError::Encoding("token lifetime is too large".into()))?;

        let claims = Claims {
            sub: subject.to_string(),
            jti: token_id.to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(lifetime),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verifies signature, algorithm family and the `nbf`/`exp` window.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = hmac_validation();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        self.decode(token, &validation)
    }

    /// Checks the signature only; the validity window is not enforced.
    ///
    /// Meant for tokens the caller has just minted.
    pub fn claims(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = hmac_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        self.decode(token, &validation)
    }

    fn decode(&self, token: &str, validation: &Validation) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.signing_key),
            validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })
    }
}

// Only the HMAC family is accepted, so a token cannot pick `none` or an asymmetric scheme.
fn hmac_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation
}
