use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{DbExhibition, DbFile};
use crate::error::ExpoError;
use crate::types::contact::ContactShort;
use crate::types::file::FileShort;
use crate::types::validation::{max_len, required};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExhibitionCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub preview_file_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ExhibitionCreate {
    pub fn validate(&self) -> Result<(), ExpoError> {
        required("title", &self.title)?;
        max_len("title", &self.title, 200)?;
        check_dates(self.start_date, self.end_date)
    }
}

pub fn check_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ExpoError> {
    if end < start {
        return Err(ExpoError::Validation(
            "end_date cannot be earlier than start_date".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExhibitionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub preview_file_id: Option<i64>,
}

impl ExhibitionUpdate {
    /// Merges into the stored row and validates the merged dates.
    pub fn apply_to(self, ex: &mut DbExhibition, now: DateTime<Utc>) -> Result<(), ExpoError> {
        if let Some(title) = self.title {
            required("title", &title)?;
            max_len("title", &title, 200)?;
            ex.title = title;
        }
        if let Some(v) = self.description {
            ex.description = Some(v);
        }
        if let Some(v) = self.start_date {
            ex.start_date = v;
        }
        if let Some(v) = self.end_date {
            ex.end_date = v;
        }
        if let Some(v) = self.preview_file_id {
            ex.preview_file_id = Some(v);
        }
        check_dates(ex.start_date, ex.end_date)?;
        ex.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhibitionSort {
    #[default]
    StartDate,
    EndDate,
    Title,
    CreatedAt,
    Id,
}

impl ExhibitionSort {
    /// Unknown names fall back to `start_date`.
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some("end_date") => ExhibitionSort::EndDate,
            Some("title") => ExhibitionSort::Title,
            Some("created_at") => ExhibitionSort::CreatedAt,
            Some("id") => ExhibitionSort::Id,
            _ => ExhibitionSort::StartDate,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            ExhibitionSort::StartDate => "start_date",
            ExhibitionSort::EndDate => "end_date",
            ExhibitionSort::Title => "title",
            ExhibitionSort::CreatedAt => "created_at",
            ExhibitionSort::Id => "id",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExhibitionListQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default = "default_true")]
    pub sort_desc: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExhibitionSummary {
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preview_file_id: Option<i64>,
}

impl From<&DbExhibition> for ExhibitionSummary {
    fn from(e: &DbExhibition) -> Self {
        Self {
            id: e.id,
            title: e.title.clone(),
            start_date: e.start_date,
            end_date: e.end_date,
            preview_file_id: e.preview_file_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExhibitionDetails {
    #[serde(flatten)]
    pub exhibition: DbExhibition,
    pub preview_file: Option<FileShort>,
    pub contacts: Vec<ContactShort>,
}

impl ExhibitionDetails {
    pub fn new(exhibition: DbExhibition, preview: Option<&DbFile>, contacts: Vec<ContactShort>) -> Self {
        Self {
            exhibition,
            preview_file: preview.map(FileShort::from),
            contacts,
        }
    }
}
