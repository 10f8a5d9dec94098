pub mod authentication;
pub mod cookies;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;
pub mod verification;

use lazy_static::lazy_static;
use serde::Deserialize;
use validator::Validate;

pub use authentication::{AuthenticationService, BlockingPolicy};
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use session::{AuthorizationService, SessionLifetimes};
pub use token::{Claims, TokenCodec};
pub use verification::{
    AlphanumericGenerator, RandomTokenGenerator, TokenPolicy, VerificationLifetimes,
    VerificationService,
};

lazy_static! {
    // Letters of any script, spaces, apostrophes and hyphens.
    static ref NAME_REGEX: regex::Regex = regex::Regex::new(r"^[\p{L}][\p{L} '\-]*$").unwrap();
}

/// Payload of a sign-in request.
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    /// Client fingerprint that failed attempts are counted against.
    #[validate(length(min = 1, max = 256))]
    pub fingerprint: String,
}

/// Payload for registering a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(
        length(min = 1, max = 64),
        regex(path = "NAME_REGEX", message = "Name may contain letters, spaces, apostrophes or hyphens")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 64),
        regex(path = "NAME_REGEX", message = "Name may contain letters, spaces, apostrophes or hyphens")
    )]
    pub last_name: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshSessionRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPasswordResetRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 6))]
    pub password: String,
}
