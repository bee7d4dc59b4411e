use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::missing_file_field;
use crate::db::DbExhibition;
use crate::error::ExpoError;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::router::ExpoState;
use crate::service::export::{contacts_workbook, export_file_name};
use crate::service::uploads::remove_from_disk;
use crate::service::{Naming, UploadRules};
use crate::types::contact::ContactShort;
use crate::types::exhibition::{
    ExhibitionCreate, ExhibitionDetails, ExhibitionListQuery, ExhibitionUpdate,
};
use crate::types::file::FileShort;
use crate::types::{Page, Pagination};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

async fn load(state: &ExpoState, id: i64) -> Result<DbExhibition, ExpoError> {
    state
        .db
        .get_exhibition(id)
        .await?
        .ok_or(ExpoError::NotFound("Exhibition"))
}

async fn ensure_preview_exists(state: &ExpoState, file_id: Option<i64>) -> Result<(), ExpoError> {
    if let Some(file_id) = file_id
        && state.db.get_file(file_id).await?.is_none()
    {
        return Err(ExpoError::NotFound("Preview file"));
    }
    Ok(())
}

pub async fn create_exhibition(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ExhibitionCreate>,
) -> Result<(StatusCode, Json<DbExhibition>), ExpoError> {
    input.validate()?;
    ensure_preview_exists(&state, input.preview_file_id).await?;
    let ex = state.db.create_exhibition(&input, Utc::now()).await?;
    info!(id = ex.id, by = admin.id, is_active = ex.is_active, "exhibition created");
    Ok((StatusCode::CREATED, Json(ex)))
}

pub async fn list_exhibitions(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Query(q): Query<ExhibitionListQuery>,
    Query(window): Query<Pagination>,
) -> Result<Json<Page<DbExhibition>>, ExpoError> {
    let today = Utc::now().date_naive();
    let page = state
        .db
        .list_exhibitions(&q, &user, today, window.validate()?)
        .await?;
    Ok(Json(page))
}

pub async fn active_exhibition(
    State(state): State<ExpoState>,
    RequireAuth(_): RequireAuth,
) -> Result<Json<DbExhibition>, ExpoError> {
    let ex = state
        .db
        .active_exhibition()
        .await?
        .ok_or(ExpoError::NotFound("Active exhibition"))?;
    Ok(Json(ex))
}

pub async fn get_exhibition(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ExhibitionDetails>, ExpoError> {
    let ex = load(&state, id).await?;
    let preview = match ex.preview_file_id {
        Some(file_id) => state.db.get_file(file_id).await?,
        None => None,
    };
    let contacts = state.db.contacts_for_exhibition(id).await?;
    let contacts = contacts.iter().map(ContactShort::from).collect();
    Ok(Json(ExhibitionDetails::new(ex, preview.as_ref(), contacts)))
}

pub async fn update_exhibition(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
    Json(patch): Json<ExhibitionUpdate>,
) -> Result<Json<DbExhibition>, ExpoError> {
    ensure_preview_exists(&state, patch.preview_file_id).await?;
    let mut ex = load(&state, id).await?;
    patch.apply_to(&mut ex, Utc::now())?;
    state.db.save_exhibition(&ex).await?;
    Ok(Json(ex))
}

pub async fn activate_exhibition(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<DbExhibition>, ExpoError> {
    let ex = state
        .db
        .activate_exhibition(id, Utc::now())
        .await?
        .ok_or(ExpoError::NotFound("Exhibition"))?;
    Ok(Json(ex))
}

pub async fn delete_exhibition(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, ExpoError> {
    if !state.db.delete_exhibition(id).await? {
        return Err(ExpoError::NotFound("Exhibition"));
    }
    info!(id, by = admin.id, "exhibition deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart field `file`; images only.
pub async fn upload_preview(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ExpoError> {
    load(&state, id).await?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let stored = state
            .uploads
            .save_field(
                field,
                "exhibitions",
                &UploadRules::EXHIBITION_PREVIEW,
                &Naming::Prefixed(format!("exhibition_{id}")),
            )
            .await?;
        let (ex, file) = match state.db.set_exhibition_preview(id, &stored, Utc::now()).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Err(rm) = remove_from_disk(&stored.path).await {
                    warn!(path = %stored.path, error = %rm, "orphaned preview left on disk");
                }
                return Err(e);
            }
        };
        info!(id, file_id = file.id, "exhibition preview stored");
        return Ok(Json(json!({
            "message": "Preview uploaded",
            "exhibition": ex,
            "file": FileShort::from(&file),
        })));
    }
    Err(missing_file_field("file"))
}

/// Spreadsheet of the exhibition's contacts.
pub async fn export_contacts(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Response, ExpoError> {
    let ex = load(&state, id).await?;
    let contacts = state.db.contacts_for_exhibition(id).await?;
    if contacts.is_empty() {
        return Err(ExpoError::NotFound("Contacts for exhibition"));
    }
    let rows = contacts.len();
    let bytes = tokio::task::spawn_blocking(move || contacts_workbook(&ex, &contacts)).await??;
    info!(id, rows, "exhibition contacts exported");

    let disposition = format!("attachment; filename=\"{}\"", export_file_name(id));
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
