use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbExhibition {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preview_file_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbContact {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub full_name: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub city: Option<String>,
    pub questionnaire: Json<Value>,
    pub exhibition_id: i64,
    pub author_id: Option<i64>,
    pub is_validated: bool,
    pub validated_by_id: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFile {
    pub id: i64,
    pub name: String,
    pub format: String,
    pub path: String,
    pub url: String,
    /// Upload directory the file was stored under (`contacts`, `exhibitions`, `general`, ...).
    pub kind: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContactFileType {
    BusinessCardFront,
    BusinessCardBack,
    Document,
    Other,
}

impl ContactFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactFileType::BusinessCardFront => "business_card_front",
            ContactFileType::BusinessCardBack => "business_card_back",
            ContactFileType::Document => "document",
            ContactFileType::Other => "other",
        }
    }

    /// Multipart field name to attachment kind, for the contact upload form.
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "business_card_front" => Some(ContactFileType::BusinessCardFront),
            "business_card_back" => Some(ContactFileType::BusinessCardBack),
            "document" => Some(ContactFileType::Document),
            _ => None,
        }
    }
}

/// A file attached to a contact, joined with its link row.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct DbContactFile {
    pub file_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: ContactFileType,
    pub url: String,
    pub format: String,
    #[serde(skip)]
    pub path: String,
    pub created_at: DateTime<Utc>,
}
