use crate::{
    auth::{hash_password, ConfirmPasswordResetRequest, VerificationService},
    error::AppError,
    users::UserStore,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailQuery {
    pub token: String,
}

/// Confirm an email address
///
/// Consumes the token mailed at registration and marks the owner's email as confirmed.
#[get("/confirm-email")]
pub async fn confirm_email(
    users: web::Data<dyn UserStore>,
    verification: web::Data<VerificationService>,
    query: web::Query<ConfirmEmailQuery>,
) -> Result<impl Responder, AppError> {
    let user_id = verification.verify_email_confirm_token(&query.token).await?;
    users.confirm_email(user_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Set a new password with a password reset token
#[post("/confirm-password-reset")]
pub async fn confirm_password_reset(
    users: web::Data<dyn UserStore>,
    verification: web::Data<VerificationService>,
    body: web::Json<ConfirmPasswordResetRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    let user_id = verification.verify_password_reset_token(&body.token).await?;
    let password_hash = hash_password(&body.password)?;
    users.update_password(user_id, &password_hash).await?;

    Ok(HttpResponse::Ok().json(json!({ "id": user_id })))
}
