use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::Claims;
use crate::error::AppError;

/// The subject of the access token that `AuthMiddleware` accepted for this request.
///
/// Only usable on routes wrapped by `AuthMiddleware`; anywhere else the claims are
/// missing from the request extensions and extraction fails with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    /// The subject parsed as a numeric user id.
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.0
            .parse()
            .map_err(|_| AppError::Unauthorized("Token subject is not a user id".into()))
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Claims>() {
            Some(claims) => ready(Ok(AuthenticatedUser(claims.sub.clone()))),
            None => {
                let err = AppError::Unauthorized(
                    "Claims not found in request. Ensure AuthMiddleware is active.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}
