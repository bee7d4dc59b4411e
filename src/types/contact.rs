use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;

use crate::db::DbContact;
use crate::error::ExpoError;
use crate::types::exhibition::ExhibitionSummary;
use crate::types::validation::{max_len, normalize_email, opt_max_len, required, validate_phone};

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn check_questionnaire(q: &Value) -> Result<(), ExpoError> {
    if !q.is_object() {
        return Err(ExpoError::Validation(
            "questionnaire must be a JSON object".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub full_name: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Falls back to the active exhibition when absent.
    #[serde(default)]
    pub exhibition_id: Option<i64>,
    #[serde(default = "empty_object")]
    pub questionnaire: Value,
}

impl ContactCreate {
    /// Checks every field and lowercases the email in place.
    pub fn validate(&mut self) -> Result<(), ExpoError> {
        required("title", &self.title)?;
        max_len("title", &self.title, 200)?;
        required("full_name", &self.full_name)?;
        max_len("full_name", &self.full_name, 255)?;
        required("position", &self.position)?;
        max_len("position", &self.position, 255)?;
        opt_max_len("city", self.city.as_deref(), 255)?;
        self.email = normalize_email(&self.email)?;
        validate_phone(&self.phone_number)?;
        check_questionnaire(&self.questionnaire)
    }

    pub fn probe(&self) -> DuplicateProbe {
        DuplicateProbe {
            email: Some(self.email.clone()),
            phone_number: Some(self.phone_number.clone()),
        }
    }
}

/// Fields any author may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub questionnaire: Option<Value>,
}

impl ContactUpdate {
    pub fn validate(&mut self) -> Result<(), ExpoError> {
        if let Some(v) = self.title.as_deref() {
            required("title", v)?;
            max_len("title", v, 200)?;
        }
        if let Some(v) = self.full_name.as_deref() {
            required("full_name", v)?;
            max_len("full_name", v, 255)?;
        }
        if let Some(v) = self.position.as_deref() {
            required("position", v)?;
            max_len("position", v, 255)?;
        }
        opt_max_len("city", self.city.as_deref(), 255)?;
        if let Some(v) = self.email.as_deref() {
            self.email = Some(normalize_email(v)?);
        }
        if let Some(v) = self.phone_number.as_deref() {
            validate_phone(v)?;
        }
        if let Some(q) = self.questionnaire.as_ref() {
            check_questionnaire(q)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.full_name.is_none()
            && self.position.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.city.is_none()
            && self.questionnaire.is_none()
    }

    /// Only the identifying fields this patch touches.
    pub fn probe(&self) -> DuplicateProbe {
        DuplicateProbe {
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
        }
    }

    pub fn apply_to(self, c: &mut DbContact) {
        if let Some(v) = self.title {
            c.title = v;
        }
        if let Some(v) = self.description {
            c.description = Some(v);
        }
        if let Some(v) = self.full_name {
            c.full_name = v;
        }
        if let Some(v) = self.position {
            c.position = v;
        }
        if let Some(v) = self.email {
            c.email = v;
        }
        if let Some(v) = self.phone_number {
            c.phone_number = v;
        }
        if let Some(v) = self.city {
            c.city = Some(v);
        }
        if let Some(v) = self.questionnaire {
            c.questionnaire = Json(v);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactAdminUpdate {
    #[serde(flatten)]
    pub fields: ContactUpdate,
    pub exhibition_id: Option<i64>,
    pub notes: Option<String>,
    pub is_validated: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub is_validated: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactBatchCreate {
    pub exhibition_id: i64,
    pub contacts: Vec<ContactCreate>,
}

#[derive(Debug, Serialize)]
pub struct SkippedContact {
    pub index: usize,
    pub email: String,
    pub phone_number: String,
    pub duplicate_fields: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub created: Vec<DbContact>,
    pub skipped: Vec<SkippedContact>,
}

/// Identifying values looked up for duplicates. `None` fields are not compared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateProbe {
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl DuplicateProbe {
    pub fn is_empty(&self) -> bool {
        self.email.as_deref().is_none_or(str::is_empty)
            && self.phone_number.as_deref().is_none_or(str::is_empty)
    }
}

/// Union of matching fields over all candidates, in `email`, `phone_number` order.
pub fn duplicate_fields(probe: &DuplicateProbe, matches: &[DbContact]) -> Vec<&'static str> {
    let email_hit = probe
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .is_some_and(|e| matches.iter().any(|c| c.email == e));
    let phone_hit = probe
        .phone_number
        .as_deref()
        .filter(|p| !p.is_empty())
        .is_some_and(|p| matches.iter().any(|c| c.phone_number == p));

    let mut fields = Vec::with_capacity(2);
    if email_hit {
        fields.push("email");
    }
    if phone_hit {
        fields.push("phone_number");
    }
    fields
}

#[derive(Debug, Deserialize)]
pub struct DuplicateCheckRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub exhibition_id: Option<i64>,
    #[serde(default)]
    pub exclude_id: Option<i64>,
}

impl DuplicateCheckRequest {
    pub fn probe(&self) -> DuplicateProbe {
        DuplicateProbe {
            email: self
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            phone_number: self
                .phone_number
                .clone()
                .filter(|p| !p.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheckResponse {
    pub is_duplicate: bool,
    pub duplicate_fields: Vec<&'static str>,
    pub existing_contact: Option<ContactShort>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactListQuery {
    pub exhibition_id: Option<i64>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub exhibition_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContactListItem {
    pub id: i64,
    pub title: String,
    pub full_name: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub city: Option<String>,
    pub exhibition_id: i64,
    pub exhibition_title: Option<String>,
    pub is_validated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactShort {
    pub id: i64,
    pub title: String,
    pub full_name: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<&DbContact> for ContactShort {
    fn from(c: &DbContact) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            full_name: c.full_name.clone(),
            position: c.position.clone(),
            email: c.email.clone(),
            phone_number: c.phone_number.clone(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactWithExhibition {
    #[serde(flatten)]
    pub contact: DbContact,
    pub exhibition: Option<ExhibitionSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, FromRow)]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ContactStats {
    pub total_contacts: i64,
    pub contacts_by_exhibition: Vec<NamedCount>,
    pub contacts_by_position: Vec<NamedCount>,
    pub contacts_last_week: i64,
    pub contacts_today: i64,
}
