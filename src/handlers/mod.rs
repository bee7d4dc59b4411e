use axum::Json;
use serde_json::{Value, json};

use crate::db::DbUser;
use crate::error::ExpoError;

pub mod contacts;
pub mod exhibitions;
pub mod files;
pub mod ocr;
pub mod session;
pub mod users;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Authors manage their own records; admins manage everything.
pub(crate) fn ensure_owner(user: &DbUser, author_id: Option<i64>) -> Result<(), ExpoError> {
    if user.is_admin || author_id == Some(user.id) {
        Ok(())
    } else {
        Err(ExpoError::Forbidden("Not enough permissions"))
    }
}

pub(crate) fn missing_file_field(name: &str) -> ExpoError {
    ExpoError::Validation(format!("multipart field '{name}' is required"))
}
