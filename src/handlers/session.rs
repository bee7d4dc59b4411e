use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::db::DbUser;
use crate::error::ExpoError;
use crate::middleware::auth::{end_session, issue_session, session_from_jar};
use crate::router::ExpoState;
use crate::types::user::{
    LoginGetQuery, LoginRequest, LoginResponse, SessionLoginRequest, UserProfile, UserShort,
};

async fn sign_in(
    state: &ExpoState,
    jar: PrivateCookieJar,
    profile: &UserProfile,
    session_id: &str,
) -> Result<(PrivateCookieJar, DbUser), ExpoError> {
    let user = state.db.upsert_login(profile, Utc::now()).await?;
    info!(user_id = user.id, is_admin = user.is_admin, "user signed in");
    let jar = issue_session(jar, session_id, user.id, state.secure_cookies());
    Ok((jar, user))
}

fn login_response(jar: PrivateCookieJar, user: &DbUser) -> Response {
    let body = LoginResponse {
        message: "Signed in",
        user: UserShort::from(user),
    };
    (jar, Json(body)).into_response()
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// POST /login with identity fields supplied by the intranet frontend.
pub async fn login(
    State(state): State<ExpoState>,
    jar: PrivateCookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ExpoError> {
    let id = req
        .id
        .as_ref()
        .and_then(|id| id.as_i64())
        .ok_or_else(|| ExpoError::Validation("id is required".into()))?;
    let session_id = non_blank(req.session_id.as_deref())
        .ok_or_else(|| ExpoError::Validation("session_id is required".into()))?
        .to_string();
    let profile = UserProfile::new(id, req.fio.full_name(), req.position, req.department);

    let (jar, user) = sign_in(&state, jar, &profile, &session_id).await?;
    Ok(login_response(jar, &user))
}

/// GET /login_get: same as `/login`, then redirects with the cookies set.
pub async fn login_get(
    State(state): State<ExpoState>,
    jar: PrivateCookieJar,
    Query(q): Query<LoginGetQuery>,
) -> Result<Response, ExpoError> {
    let session_id = non_blank(Some(&q.session_id))
        .ok_or_else(|| ExpoError::Validation("session_id is required".into()))?
        .to_string();
    let profile = UserProfile::new(q.external_id, q.full_name, q.position, q.department);

    let (jar, _) = sign_in(&state, jar, &profile, &session_id).await?;
    let target = state.config.basic.login_redirect_url.as_str();
    Ok((jar, Redirect::to(target)).into_response())
}

/// POST /login/session: trusts only what the identity provider says about the token.
pub async fn login_session(
    State(state): State<ExpoState>,
    jar: PrivateCookieJar,
    Json(req): Json<SessionLoginRequest>,
) -> Result<Response, ExpoError> {
    let session_id = req.session_id.trim();
    let profile = state
        .auth
        .resolve(session_id)
        .await?
        .ok_or(ExpoError::Unauthorized)?;

    let (jar, user) = sign_in(&state, jar, &profile, session_id).await?;
    Ok(login_response(jar, &user))
}

pub async fn logout(jar: PrivateCookieJar) -> impl IntoResponse {
    (end_session(jar), Json(json!({"message": "Signed out"})))
}

/// 401 without session cookies, 404 when the user row is gone.
pub async fn me(
    State(state): State<ExpoState>,
    jar: PrivateCookieJar,
) -> Result<Json<DbUser>, ExpoError> {
    let (_, user_id) = session_from_jar(&jar).ok_or(ExpoError::Unauthorized)?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or(ExpoError::NotFound("User"))?;
    Ok(Json(user))
}
