use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::db::DbUser;
use crate::error::ExpoError;
use crate::middleware::{RequireAdmin, SessionUser};
use crate::router::ExpoState;
use crate::types::user::{AdminFlag, UserListQuery, UserUpdate};
use crate::types::{Page, Pagination};

pub async fn me_admin(SessionUser(user): SessionUser) -> Json<AdminFlag> {
    Json(AdminFlag {
        is_admin: user.is_some_and(|u| u.is_admin),
    })
}

pub async fn list_users(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Query(q): Query<UserListQuery>,
    Query(window): Query<Pagination>,
) -> Result<Json<Page<DbUser>>, ExpoError> {
    let page = state.db.list_users(&q, window.validate()?).await?;
    Ok(Json(page))
}

pub async fn get_user(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<DbUser>, ExpoError> {
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or(ExpoError::NotFound("User"))?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(patch): Json<UserUpdate>,
) -> Result<Json<DbUser>, ExpoError> {
    patch.validate()?;
    let mut user = state
        .db
        .get_user(id)
        .await?
        .ok_or(ExpoError::NotFound("User"))?;
    patch.apply_to(&mut user, Utc::now());
    state.db.save_user(&user).await?;
    info!(id, by = admin.id, is_admin = user.is_admin, "user updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, ExpoError> {
    if !state.db.delete_user(id).await? {
        return Err(ExpoError::NotFound("User"));
    }
    info!(id, by = admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
