use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{ensure_owner, missing_file_field};
use crate::db::{ContactFileType, DbFile};
use crate::error::ExpoError;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::router::ExpoState;
use crate::service::uploads::remove_from_disk;
use crate::service::{Naming, UploadRules};
use crate::types::file::{
    BusinessCardQuery, BusinessCardResponse, FileListQuery, MultiUploadQuery, UploadQuery,
};
use crate::types::{Page, Pagination};

/// Multipart field `file`, stored under `file_type`.
pub async fn upload_file(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Query(q): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DbFile>), ExpoError> {
    let naming = match q.custom_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Naming::Custom(name.to_string()),
        _ => Naming::Unique,
    };
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let stored = state
            .uploads
            .save_field(field, &q.file_type, &UploadRules::GENERAL, &naming)
            .await?;
        let file = state.db.record_file(&stored, Utc::now()).await?;
        info!(id = file.id, by = user.id, size = file.size_bytes, "file uploaded");
        return Ok((StatusCode::CREATED, Json(file)));
    }
    Err(missing_file_field("file"))
}

/// Repeated multipart field `files`; each file succeeds or fails on its own.
pub async fn upload_files(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Query(q): Query<MultiUploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ExpoError> {
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let saved = match state
            .uploads
            .save_field(field, &q.file_type, &UploadRules::GENERAL, &Naming::Unique)
            .await
        {
            Ok(stored) => state.db.record_file(&stored, Utc::now()).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(file) => uploaded.push(file),
            Err(e) => {
                warn!(file = %name, error = %e, "skipping failed upload");
                failed.push(json!({"name": name, "error": e.to_string()}));
            }
        }
    }
    info!(by = user.id, uploaded = uploaded.len(), failed = failed.len(), "batch upload done");
    Ok((
        StatusCode::CREATED,
        Json(json!({"uploaded": uploaded, "failed": failed})),
    ))
}

/// Business-card scan, optionally attached to a contact as its front or back side.
pub async fn upload_business_card(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Query(q): Query<BusinessCardQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BusinessCardResponse>), ExpoError> {
    if let Some(contact_id) = q.contact_id {
        let contact = state
            .db
            .get_contact(contact_id)
            .await?
            .ok_or(ExpoError::NotFound("Contact"))?;
        ensure_owner(&user, contact.author_id)?;
    }
    let file_type: ContactFileType = q.side.into();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let naming = match q.contact_id {
            Some(id) => Naming::Prefixed(format!("contact_{id}_business_card")),
            None => Naming::Prefixed("business_card".to_string()),
        };
        let stored = state
            .uploads
            .save_field(field, "contacts", &UploadRules::BUSINESS_CARD, &naming)
            .await?;
        let now = Utc::now();
        let saved = match q.contact_id {
            Some(contact_id) => {
                let max_files = state.config.uploads.max_files_per_contact;
                state
                    .db
                    .attach_files(contact_id, &[(stored.clone(), file_type)], max_files, now)
                    .await
                    .and_then(|attached| {
                        attached
                            .into_iter()
                            .next()
                            .map(|(file, _)| file)
                            .ok_or(ExpoError::NotFound("File"))
                    })
            }
            None => state.db.record_file(&stored, now).await,
        };
        let file = match saved {
            Ok(file) => file,
            Err(e) => {
                if let Err(rm) = remove_from_disk(&stored.path).await {
                    warn!(path = %stored.path, error = %rm, "orphaned business card left on disk");
                }
                return Err(e);
            }
        };
        return Ok((
            StatusCode::CREATED,
            Json(BusinessCardResponse {
                file,
                contact_id: q.contact_id,
                file_type,
            }),
        ));
    }
    Err(missing_file_field("file"))
}

pub async fn list_files(
    State(state): State<ExpoState>,
    RequireAuth(_): RequireAuth,
    Query(q): Query<FileListQuery>,
    Query(window): Query<Pagination>,
) -> Result<Json<Page<DbFile>>, ExpoError> {
    let page = state
        .db
        .list_files(q.format_filter.as_deref(), window.validate()?)
        .await?;
    Ok(Json(page))
}

pub async fn get_file(
    State(state): State<ExpoState>,
    RequireAuth(_): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<DbFile>, ExpoError> {
    let file = state
        .db
        .get_file(id)
        .await?
        .ok_or(ExpoError::NotFound("File"))?;
    Ok(Json(file))
}

/// Removes the file from disk first; a file already gone is not an error.
pub async fn delete_file(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, ExpoError> {
    let file = state
        .db
        .get_file(id)
        .await?
        .ok_or(ExpoError::NotFound("File"))?;
    remove_from_disk(&file.path).await?;
    state.db.delete_file_row(id).await?;
    info!(id, by = admin.id, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}
