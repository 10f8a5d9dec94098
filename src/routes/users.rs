use crate::{auth::AuthenticatedUser, error::AppError, users::UserStore};
use actix_web::{get, web, HttpResponse, Responder};

/// Get the signed-in user
#[get("/me")]
pub async fn me(
    users: web::Data<dyn UserStore>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = users
        .get_user_by_id(user.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(user))
}
