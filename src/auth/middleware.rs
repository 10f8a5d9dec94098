use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::cookies::{session_cookies, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::session::AuthorizationService;
use crate::auth::token::Claims;
use crate::error::{AppError, AuthError};
use crate::models::TokenPair;

/// Rejects requests without an active access token.
///
/// Tokens are checked through the `AuthorizationService` registered as app data, so
/// revoked and rotated tokens are refused even while their signature is still valid.
/// The access token cookie is tried first; when it has expired the refresh token
/// cookie rotates the session and the new pair is set on the response. Without usable
/// cookies the `Authorization: Bearer` header is checked. On success the token claims
/// are placed in the request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let authorization = req
                .app_data::<web::Data<AuthorizationService>>()
                .cloned()
                .ok_or_else(|| {
                    log::error!("AuthorizationService is not registered as app data");
                    AppError::InternalServerError("Internal error".into())
                })?;

            let (claims, rotated) = match authorize_by_cookies(&req, &authorization).await {
                Ok(Some(found)) => found,
                result => {
                    if let Err(e) = result {
                        log::debug!("Session cookies rejected, trying bearer token: {}", e);
                    }
                    let token = bearer_token(&req)
                        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
                    let claims = authorization
                        .validate_access_token(&token)
                        .await
                        .map_err(AppError::from)?;
                    (claims, None)
                }
            };

            req.extensions_mut().insert(claims);
            let mut res = service.call(req).await?;

            if let Some(tokens) = rotated {
                for cookie in session_cookies(&tokens, authorization.lifetimes()) {
                    if let Err(e) = res.response_mut().add_cookie(&cookie) {
                        log::error!("Failed to set session cookie: {}", e);
                    }
                }
            }
            Ok(res)
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Authorizes with the access token cookie, rotating the session through the refresh
/// token cookie when the access token has expired or is no longer active.
///
/// `Ok(None)` means the cookies cannot authorize this request and the bearer header
/// should be tried. A rotated pair is returned alongside the claims so it can be sent
/// back as cookies.
async fn authorize_by_cookies(
    req: &ServiceRequest,
    authorization: &AuthorizationService,
) -> Result<Option<(Claims, Option<TokenPair>)>, AuthError> {
    if let Some(cookie) = req.cookie(ACCESS_TOKEN_COOKIE) {
        match authorization.validate_access_token(cookie.value()).await {
            Ok(claims) => return Ok(Some((claims, None))),
            Err(e) if e.is_expired_token() || matches!(e, AuthError::NotActiveAccessToken) => {
                log::debug!("Access token cookie is stale ({}), refreshing session", e);
            }
            Err(e) => return Err(e),
        }
    }

    let refresh_token = match req.cookie(REFRESH_TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return Ok(None),
    };
    let tokens = authorization.refresh_session(&refresh_token).await?;
    let claims = authorization.get_access_token_claims(&tokens.access_token)?;
    Ok(Some((claims, Some(tokens))))
}
