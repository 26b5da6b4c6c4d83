use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::token::{self, Claims};
use crate::error::AppError;
use crate::state::AppState;

/// The verified session of the requesting user.
///
/// A missing cookie and a cookie that fails verification are distinct
/// failures (`NoSession` vs `BadSession`); both reject with 401.
#[derive(Debug)]
pub struct AuthSession {
    pub user_id: String,
    pub username: String,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie = get_cookie_value(parts, &state.config.auth.cookie_name)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::NoSession)?;

        let claims = token::verify(&state.config.auth.secret, cookie)?;
        Ok(AuthSession {
            user_id: claims.sub.clone(),
            username: claims.username.clone(),
            claims,
        })
    }
}

fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
