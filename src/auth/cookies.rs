//! Session tokens delivered as HttpOnly cookies.

use actix_web::cookie::{time, Cookie, SameSite};

use crate::auth::session::SessionLifetimes;
use crate::models::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

fn session_cookie(name: &'static str, value: String, max_age: std::time::Duration) -> Cookie<'static> {
    let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .finish()
}

/// Cookies carrying a freshly minted pair; each lives as long as its token.
pub fn session_cookies(tokens: &TokenPair, lifetimes: SessionLifetimes) -> [Cookie<'static>; 2] {
    [
        session_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            lifetimes.access_token,
        ),
        session_cookie(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            lifetimes.refresh_token,
        ),
    ]
}

/// Cookies telling the client to drop both tokens.
pub fn removal_cookies() -> [Cookie<'static>; 2] {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE].map(|name| {
        let mut cookie = Cookie::build(name, "").path("/").http_only(true).finish();
        cookie.make_removal();
        cookie
    })
}
