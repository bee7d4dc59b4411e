use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DbUser;
use crate::error::ExpoError;
use crate::types::validation::opt_max_len;

pub const UNKNOWN_USER: &str = "Unknown user";

/// External ids arrive either as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Number(i64),
    Text(String),
}

impl ExternalId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ExternalId::Number(n) => Some(*n),
            ExternalId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fio {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
}

/// Joins name parts with single spaces; all-blank parts yield `None`.
pub fn join_name<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let joined = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

impl Fio {
    pub fn full_name(&self) -> Option<String> {
        join_name([
            self.last_name.as_deref(),
            self.first_name.as_deref(),
            self.middle_name.as_deref(),
        ])
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub id: Option<ExternalId>,
    #[serde(default)]
    pub fio: Fio,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginGetQuery {
    pub external_id: i64,
    pub session_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionLoginRequest {
    pub session_id: String,
}

/// Identity to upsert on login, whichever way it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
}

impl UserProfile {
    pub fn new(
        id: i64,
        full_name: Option<String>,
        position: Option<String>,
        department: Option<String>,
    ) -> Self {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            id,
            full_name: blank_to_none(full_name).unwrap_or_else(|| UNKNOWN_USER.to_string()),
            position: blank_to_none(position),
            department: blank_to_none(department),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserShort {
    pub id: i64,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub is_admin: bool,
}

impl From<&DbUser> for UserShort {
    fn from(u: &DbUser) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            position: u.position.clone(),
            department: u.department.clone(),
            is_admin: u.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: UserShort,
}

#[derive(Debug, Serialize)]
pub struct AdminFlag {
    pub is_admin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub is_admin: Option<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ExpoError> {
        opt_max_len("full_name", self.full_name.as_deref(), 255)?;
        opt_max_len("position", self.position.as_deref(), 255)?;
        opt_max_len("department", self.department.as_deref(), 255)?;
        if self.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ExpoError::Validation("full_name must not be blank".into()));
        }
        Ok(())
    }

    pub fn apply_to(self, user: &mut DbUser, now: DateTime<Utc>) {
        if let Some(v) = self.full_name {
            user.full_name = v;
        }
        if let Some(v) = self.position {
            user.position = Some(v);
        }
        if let Some(v) = self.department {
            user.department = Some(v);
        }
        if let Some(v) = self.is_admin {
            user.is_admin = v;
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub is_admin: Option<bool>,
}
