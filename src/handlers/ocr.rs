use axum::{
    Json,
    extract::{Multipart, Query, State},
};
use serde::Deserialize;
use tracing::{debug, info};

use super::missing_file_field;
use crate::error::ExpoError;
use crate::ocr::EnhancedOutcome;
use crate::router::ExpoState;
use crate::service::UploadRules;
use crate::service::uploads::read_field_limited;

fn default_filter() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct EnhancedQuery {
    #[serde(default = "default_filter")]
    pub filter: bool,
}

fn throttle(state: &ExpoState) -> Result<(), ExpoError> {
    state.ocr_limiter.check().map_err(|_| ExpoError::RateLimited)
}

async fn read_image(multipart: &mut Multipart) -> Result<Vec<u8>, ExpoError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = read_field_limited(field, &UploadRules::OCR_IMAGE).await?;
        if bytes.is_empty() {
            return Err(ExpoError::Validation("uploaded image is empty".into()));
        }
        return Ok(bytes);
    }
    Err(missing_file_field("file"))
}

/// Cleaned-up single pass; returns the recognized lines.
pub async fn recognize(
    State(state): State<ExpoState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<String>>, ExpoError> {
    throttle(&state)?;
    let bytes = read_image(&mut multipart).await?;
    debug!(size = bytes.len(), "OCR request");
    let lines = state.ocr.read_card(bytes).await?;
    info!(lines = lines.len(), "OCR done");
    Ok(Json(lines))
}

/// Several page-segmentation modes; the richest result wins.
pub async fn recognize_enhanced(
    State(state): State<ExpoState>,
    Query(q): Query<EnhancedQuery>,
    mut multipart: Multipart,
) -> Result<Json<EnhancedOutcome>, ExpoError> {
    throttle(&state)?;
    let bytes = read_image(&mut multipart).await?;
    let outcome = state.ocr.read_card_enhanced(bytes, q.filter).await?;
    info!(lines = outcome.lines.len(), psm = outcome.psm, "enhanced OCR done");
    Ok(Json(outcome))
}
