use serde::{Deserialize, Serialize};

use crate::db::{ContactFileType, DbContactFile, DbFile};

fn general() -> String {
    "general".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default = "general")]
    pub file_type: String,
    #[serde(default)]
    pub custom_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultiUploadQuery {
    #[serde(default = "general")]
    pub file_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSide {
    #[default]
    Front,
    Back,
}

impl From<CardSide> for ContactFileType {
    fn from(side: CardSide) -> Self {
        match side {
            CardSide::Front => ContactFileType::BusinessCardFront,
            CardSide::Back => ContactFileType::BusinessCardBack,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BusinessCardQuery {
    #[serde(default)]
    pub contact_id: Option<i64>,
    #[serde(default)]
    pub side: CardSide,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub format_filter: Option<String>,
}

/// A file written to disk that still needs its database row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub format: String,
    pub path: String,
    pub url: String,
    pub kind: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileShort {
    pub id: i64,
    pub name: String,
    pub format: String,
    pub url: String,
}

impl From<&DbFile> for FileShort {
    fn from(f: &DbFile) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            format: f.format.clone(),
            url: f.url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachedFile {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: ContactFileType,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ContactUploadResponse {
    pub message: String,
    pub files: Vec<AttachedFile>,
    pub contact_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ContactFilesResponse {
    pub contact_id: i64,
    pub total_files: usize,
    pub files: Vec<DbContactFile>,
}

#[derive(Debug, Serialize)]
pub struct BusinessCardResponse {
    #[serde(flatten)]
    pub file: DbFile,
    pub contact_id: Option<i64>,
    #[serde(rename = "type")]
    pub file_type: ContactFileType,
}
