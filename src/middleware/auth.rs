use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use time::Duration;

use crate::db::DbUser;
use crate::error::ExpoError;
use crate::router::ExpoState;

pub const SESSION_COOKIE: &str = "session_id";
pub const USER_COOKIE: &str = "user_id";
const SESSION_TTL_DAYS: i64 = 30;

/// `(session_id, user_id)` when both cookies are present and decrypt.
pub fn session_from_jar(jar: &PrivateCookieJar) -> Option<(String, i64)> {
    let session = jar.get(SESSION_COOKIE)?.value().to_owned();
    let user_id = jar.get(USER_COOKIE)?.value().parse().ok()?;
    (!session.is_empty()).then_some((session, user_id))
}

pub fn issue_session(
    jar: PrivateCookieJar,
    session_id: &str,
    user_id: i64,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(session_cookie(SESSION_COOKIE, session_id.to_string(), secure))
        .add(session_cookie(USER_COOKIE, user_id.to_string(), secure))
}

pub fn end_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(SESSION_COOKIE))
        .remove(clear_cookie(USER_COOKIE))
}

fn session_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(SESSION_TTL_DAYS))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub(crate) async fn session_jar(parts: &mut Parts, state: &ExpoState) -> PrivateCookieJar {
    match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
        Ok(jar) => jar,
        Err(never) => match never {},
    }
}

async fn current_user(parts: &mut Parts, state: &ExpoState) -> Result<Option<DbUser>, ExpoError> {
    let jar = session_jar(parts, state).await;
    match session_from_jar(&jar) {
        Some((_, user_id)) => state.db.get_user(user_id).await,
        None => Ok(None),
    }
}

/// The signed-in user, if any. Never rejects on a missing session.
#[derive(Debug, Clone)]
pub struct SessionUser(pub Option<DbUser>);

impl FromRequestParts<ExpoState> for SessionUser {
    type Rejection = ExpoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ExpoState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts, state).await?))
    }
}

/// 401 without a valid session.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub DbUser);

impl FromRequestParts<ExpoState> for RequireAuth {
    type Rejection = ExpoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ExpoState,
    ) -> Result<Self, Self::Rejection> {
        current_user(parts, state)
            .await?
            .map(Self)
            .ok_or(ExpoError::Unauthorized)
    }
}

/// 401 without a valid session, 403 for non-admins.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub DbUser);

impl FromRequestParts<ExpoState> for RequireAdmin {
    type Rejection = ExpoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ExpoState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ExpoError::Forbidden("Administrator rights required"));
        }
        Ok(Self(user))
    }
}
