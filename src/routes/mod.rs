pub mod auth;
pub mod health;
pub mod users;
pub mod verification;

use crate::auth::AuthMiddleware;
use actix_web::web;

/// Mounts the API routes. Only the `/users` scope requires an access token.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::sign_in)
            .service(auth::validate)
            .service(auth::refresh)
            .service(auth::logout)
            .service(auth::reset_password),
    )
    .service(
        web::scope("/verification")
            .service(verification::confirm_email)
            .service(verification::confirm_password_reset),
    )
    .service(web::scope("/users").wrap(AuthMiddleware).service(users::me));
}
