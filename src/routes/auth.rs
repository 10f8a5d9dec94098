use crate::{
    auth::{
        cookies::{removal_cookies, session_cookies, ACCESS_TOKEN_COOKIE},
        hash_password, AccessTokenRequest, AuthenticationService, AuthorizationService,
        RefreshSessionRequest, RegisterRequest, SignInRequest, VerificationService,
    },
    error::AppError,
    mailer::Mailer,
    models::NewUser,
    users::UserStore,
};
use actix_web::{post, web, HttpMessage, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordQuery {
    pub email: String,
}

/// Register a new user
///
/// Creates the account and mails an email confirmation token. Signing in does not
/// require a confirmed email.
#[post("/register")]
pub async fn register(
    users: web::Data<dyn UserStore>,
    verification: web::Data<VerificationService>,
    mailer: web::Data<dyn Mailer>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    if users.get_user_by_email(&register_data.email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let password_hash = hash_password(&register_data.password)?;
    let register_data = register_data.into_inner();
    let email = register_data.email.clone();
    let id = users
        .create_user(NewUser {
            email: register_data.email,
            first_name: register_data.first_name,
            last_name: register_data.last_name,
            password_hash,
        })
        .await?;

    let token = verification.create_email_confirm_token(id).await?;
    mailer.send_email_confirm(&email, &token);

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Sign in
///
/// Checks the credentials against the fingerprint's failed attempts limit and opens a
/// new session. The pair is returned in the body and also set as HttpOnly cookies.
#[post("/sign-in")]
pub async fn sign_in(
    authentication: web::Data<AuthenticationService>,
    authorization: web::Data<AuthorizationService>,
    sign_in_data: web::Json<SignInRequest>,
) -> Result<impl Responder, AppError> {
    sign_in_data.validate()?;

    let user_id = authentication
        .authenticate_by_email(
            &sign_in_data.email,
            &sign_in_data.password,
            &sign_in_data.fingerprint,
        )
        .await?;
    let tokens = authorization.create_session(&user_id.to_string()).await?;

    let mut response = HttpResponse::Ok();
    for cookie in session_cookies(&tokens, authorization.lifetimes()) {
        response.cookie(cookie);
    }
    Ok(response.json(tokens))
}

#[post("/validate")]
pub async fn validate(
    authorization: web::Data<AuthorizationService>,
    body: web::Json<AccessTokenRequest>,
) -> Result<impl Responder, AppError> {
    let claims = authorization.validate_access_token(&body.access_token).await?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": claims.sub })))
}

/// Rotate a session
///
/// The refresh token is single use: the old pair stops working whether or not the
/// new one could be issued.
#[post("/refresh")]
pub async fn refresh(
    authorization: web::Data<AuthorizationService>,
    body: web::Json<RefreshSessionRequest>,
) -> Result<impl Responder, AppError> {
    let tokens = authorization.refresh_session(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Log out
///
/// Revokes the session of the access token cookie, or of the token in the body when
/// there is no cookie, and clears both session cookies.
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    authorization: web::Data<AuthorizationService>,
    body: Option<web::Json<AccessTokenRequest>>,
) -> Result<impl Responder, AppError> {
    let access_token = match (req.cookie(ACCESS_TOKEN_COOKIE), body) {
        (Some(cookie), _) => cookie.value().to_string(),
        (None, Some(body)) => body.into_inner().access_token,
        (None, None) => return Err(AppError::BadRequest("Missing access token".into())),
    };
    authorization.revoke_session(&access_token).await?;

    let mut response = HttpResponse::NoContent();
    for cookie in removal_cookies() {
        response.cookie(cookie);
    }
    Ok(response.finish())
}

/// Request a password reset
///
/// Always answers 204 so the endpoint does not reveal which emails are registered.
#[post("/reset-password")]
pub async fn reset_password(
    users: web::Data<dyn UserStore>,
    verification: web::Data<VerificationService>,
    mailer: web::Data<dyn Mailer>,
    query: web::Query<ResetPasswordQuery>,
) -> Result<impl Responder, AppError> {
    match users.get_user_by_email(&query.email).await? {
        Some(user) => {
            let token = verification.create_password_reset_token(user.id).await?;
            mailer.send_password_reset_confirm(&user.email, &token);
        }
        None => log::debug!("Password reset requested for an unknown email"),
    }

    Ok(HttpResponse::NoContent().finish())
}
