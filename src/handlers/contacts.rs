use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::ensure_owner;
use crate::db::contacts::too_many_files;
use crate::db::{ContactFileType, DbContact, DbUser};
use crate::error::ExpoError;
use crate::middleware::{RequireAdmin, RequireAuth, SessionUser};
use crate::router::ExpoState;
use crate::service::uploads::{remove_all_from_disk, remove_from_disk};
use crate::service::{Naming, UploadRules};
use crate::types::contact::{
    BatchOutcome, ContactAdminUpdate, ContactBatchCreate, ContactCreate, ContactListItem,
    ContactListQuery, ContactShort, ContactStats, ContactUpdate, ContactWithExhibition,
    DuplicateCheckRequest, DuplicateCheckResponse, StatsQuery, ValidateQuery, duplicate_fields,
};
use crate::types::exhibition::ExhibitionSummary;
use crate::types::file::{AttachedFile, ContactFilesResponse, ContactUploadResponse, StoredFile};
use crate::types::{Page, Pagination};

async fn load(state: &ExpoState, id: i64) -> Result<DbContact, ExpoError> {
    state
        .db
        .get_contact(id)
        .await?
        .ok_or(ExpoError::NotFound("Contact"))
}

async fn load_owned(state: &ExpoState, id: i64, user: &DbUser) -> Result<DbContact, ExpoError> {
    let contact = load(state, id).await?;
    ensure_owner(user, contact.author_id)?;
    Ok(contact)
}

async fn with_exhibition(
    state: &ExpoState,
    contact: DbContact,
) -> Result<ContactWithExhibition, ExpoError> {
    let exhibition = state
        .db
        .get_exhibition(contact.exhibition_id)
        .await?
        .as_ref()
        .map(ExhibitionSummary::from);
    Ok(ContactWithExhibition {
        contact,
        exhibition,
    })
}

pub async fn questionnaire(State(state): State<ExpoState>) -> Json<Value> {
    Json(state.questionnaire.as_ref().clone())
}

/// Anonymous submissions are accepted; a session only records the author.
pub async fn create_contact(
    State(state): State<ExpoState>,
    SessionUser(user): SessionUser,
    Json(mut input): Json<ContactCreate>,
) -> Result<(StatusCode, Json<ContactWithExhibition>), ExpoError> {
    input.validate()?;
    let exhibition = match input.exhibition_id {
        Some(id) => state.db.get_exhibition(id).await?,
        None => Some(state.db.active_exhibition().await?.ok_or_else(|| {
            ExpoError::Validation("No active exhibition; exhibition_id is required".into())
        })?),
    }
    .ok_or(ExpoError::NotFound("Exhibition"))?;

    let author_id = user.as_ref().map(|u| u.id);
    let contact = state
        .db
        .create_contact(&input, exhibition.id, author_id, Utc::now())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ContactWithExhibition {
            contact,
            exhibition: Some(ExhibitionSummary::from(&exhibition)),
        }),
    ))
}

/// Every row is validated before anything is written.
pub async fn create_batch(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut batch): Json<ContactBatchCreate>,
) -> Result<(StatusCode, Json<BatchOutcome>), ExpoError> {
    if batch.contacts.is_empty() {
        return Err(ExpoError::Validation("contacts must not be empty".into()));
    }
    for (index, c) in batch.contacts.iter_mut().enumerate() {
        c.validate()
            .map_err(|e| ExpoError::Validation(format!("contacts[{index}]: {e}")))?;
    }
    if state.db.get_exhibition(batch.exhibition_id).await?.is_none() {
        return Err(ExpoError::NotFound("Exhibition"));
    }
    let outcome = state
        .db
        .create_contacts_batch(batch.exhibition_id, &batch.contacts, Some(admin.id), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn check_duplicate(
    State(state): State<ExpoState>,
    Json(req): Json<DuplicateCheckRequest>,
) -> Result<Json<DuplicateCheckResponse>, ExpoError> {
    let probe = req.probe();
    if probe.is_empty() {
        return Err(ExpoError::Validation(
            "email or phone_number is required".into(),
        ));
    }
    let matches = state
        .db
        .find_duplicates(&probe, req.exhibition_id, req.exclude_id)
        .await?;
    let fields = duplicate_fields(&probe, &matches);
    Ok(Json(DuplicateCheckResponse {
        is_duplicate: !fields.is_empty(),
        duplicate_fields: fields,
        existing_contact: matches.first().map(ContactShort::from),
    }))
}

/// Non-admins only see contacts they authored.
pub async fn list_contacts(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Query(q): Query<ContactListQuery>,
    Query(window): Query<Pagination>,
) -> Result<Json<Page<ContactListItem>>, ExpoError> {
    let author = (!user.is_admin).then_some(user.id);
    let page = state
        .db
        .list_contacts(&q, author, window.validate()?)
        .await?;
    Ok(Json(page))
}

pub async fn get_contact(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<ContactWithExhibition>, ExpoError> {
    let contact = load_owned(&state, id, &user).await?;
    Ok(Json(with_exhibition(&state, contact).await?))
}

pub async fn update_contact(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Json(mut patch): Json<ContactUpdate>,
) -> Result<Json<ContactWithExhibition>, ExpoError> {
    patch.validate()?;
    let mut contact = load_owned(&state, id, &user).await?;
    if patch.is_empty() {
        return Ok(Json(with_exhibition(&state, contact).await?));
    }
    let probe = patch.probe();
    patch.apply_to(&mut contact);
    contact.updated_at = Utc::now();
    let saved = state.db.save_contact(&contact, &probe).await?;
    Ok(Json(with_exhibition(&state, saved).await?))
}

/// Admins may also move the contact and change its validation state.
pub async fn admin_update_contact(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(mut patch): Json<ContactAdminUpdate>,
) -> Result<Json<ContactWithExhibition>, ExpoError> {
    patch.fields.validate()?;
    let mut contact = load(&state, id).await?;
    let now = Utc::now();

    let mut probe = patch.fields.probe();
    if let Some(exhibition_id) = patch.exhibition_id
        && exhibition_id != contact.exhibition_id
    {
        if state.db.get_exhibition(exhibition_id).await?.is_none() {
            return Err(ExpoError::NotFound("Exhibition"));
        }
        contact.exhibition_id = exhibition_id;
        probe.email.get_or_insert_with(|| contact.email.clone());
        probe
            .phone_number
            .get_or_insert_with(|| contact.phone_number.clone());
    }
    patch.fields.apply_to(&mut contact);
    if let Some(notes) = patch.notes {
        contact.notes = Some(notes);
    }
    if let Some(is_validated) = patch.is_validated
        && is_validated != contact.is_validated
    {
        contact.is_validated = is_validated;
        contact.validated_by_id = Some(admin.id);
        contact.validated_at = Some(now);
    }
    contact.updated_at = now;

    let saved = state.db.save_contact(&contact, &probe).await?;
    info!(id, by = admin.id, "contact updated by admin");
    Ok(Json(with_exhibition(&state, saved).await?))
}

pub async fn validate_contact(
    State(state): State<ExpoState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Query(q): Query<ValidateQuery>,
) -> Result<Json<ContactWithExhibition>, ExpoError> {
    let mut contact = load(&state, id).await?;
    let now = Utc::now();
    contact.is_validated = q.is_validated;
    contact.validated_by_id = Some(admin.id);
    contact.validated_at = Some(now);
    if let Some(notes) = q.notes {
        contact.notes = Some(notes);
    }
    contact.updated_at = now;
    let saved = state.db.save_contact(&contact, &Default::default()).await?;
    info!(id, by = admin.id, is_validated = saved.is_validated, "contact validation set");
    Ok(Json(with_exhibition(&state, saved).await?))
}

/// Attached files are removed from disk after the rows are gone.
pub async fn delete_contact(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ExpoError> {
    load_owned(&state, id, &user).await?;
    let files = state
        .db
        .delete_contact(id)
        .await?
        .ok_or(ExpoError::NotFound("Contact"))?;
    remove_all_from_disk(files.iter().map(|f| f.path.clone()).collect()).await;
    info!(id, by = user.id, files = files.len(), "contact deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn save_contact_uploads(
    state: &ExpoState,
    multipart: &mut Multipart,
    contact_id: i64,
    room: i64,
    stored: &mut Vec<(StoredFile, ContactFileType)>,
) -> Result<(), ExpoError> {
    let max_files = state.config.uploads.max_files_per_contact;
    while let Some(field) = multipart.next_field().await? {
        let Some(file_type) = field.name().and_then(ContactFileType::from_field) else {
            debug!(field = ?field.name(), "ignoring unexpected multipart field");
            continue;
        };
        if field.file_name().is_none_or(str::is_empty) {
            continue;
        }
        if stored.len() as i64 >= room {
            return Err(too_many_files(max_files));
        }
        let naming = Naming::Prefixed(format!("contact_{contact_id}_{}", file_type.as_str()));
        let file = state
            .uploads
            .save_field(field, "contacts", &UploadRules::CONTACT_FILES, &naming)
            .await?;
        stored.push((file, file_type));
    }
    Ok(())
}

/// Multipart fields `business_card_front`, `business_card_back` and `document`.
pub async fn upload_contact_files(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ContactUploadResponse>, ExpoError> {
    load_owned(&state, id, &user).await?;
    let max_files = state.config.uploads.max_files_per_contact;
    let room = max_files - state.db.count_contact_files(id).await?;
    if room <= 0 {
        return Err(too_many_files(max_files));
    }

    let mut stored = Vec::new();
    if let Err(e) = save_contact_uploads(&state, &mut multipart, id, room, &mut stored).await {
        remove_all_from_disk(stored.iter().map(|(f, _)| f.path.clone()).collect()).await;
        return Err(e);
    }
    if stored.is_empty() {
        return Err(ExpoError::Validation("No files uploaded".into()));
    }

    let attached = match state
        .db
        .attach_files(id, &stored, max_files, Utc::now())
        .await
    {
        Ok(attached) => attached,
        Err(e) => {
            remove_all_from_disk(stored.iter().map(|(f, _)| f.path.clone()).collect()).await;
            return Err(e);
        }
    };
    info!(id, count = attached.len(), "contact files uploaded");

    let files: Vec<AttachedFile> = attached
        .into_iter()
        .map(|(f, file_type)| AttachedFile {
            id: f.id,
            name: f.name,
            file_type,
            url: f.url,
        })
        .collect();
    Ok(Json(ContactUploadResponse {
        message: format!("Uploaded {} file(s)", files.len()),
        files,
        contact_id: id,
    }))
}

pub async fn list_contact_files(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<ContactFilesResponse>, ExpoError> {
    load_owned(&state, id, &user).await?;
    let files = state.db.contact_files(id).await?;
    Ok(Json(ContactFilesResponse {
        contact_id: id,
        total_files: files.len(),
        files,
    }))
}

pub async fn delete_contact_file(
    State(state): State<ExpoState>,
    RequireAuth(user): RequireAuth,
    Path((id, file_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ExpoError> {
    load_owned(&state, id, &user).await?;
    let file = state
        .db
        .detach_contact_file(id, file_id)
        .await?
        .ok_or(ExpoError::NotFound("File"))?;
    if let Err(e) = remove_from_disk(&file.path).await {
        warn!(path = %file.path, error = %e, "file row removed but disk cleanup failed");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats_overview(
    State(state): State<ExpoState>,
    RequireAdmin(_): RequireAdmin,
    Query(q): Query<StatsQuery>,
) -> Result<Json<ContactStats>, ExpoError> {
    let stats = state.db.contact_stats(q.exhibition_id, Utc::now()).await?;
    Ok(Json(stats))
}
