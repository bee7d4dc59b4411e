use serde::{Deserialize, Serialize};

use crate::error::ExpoError;

fn default_limit() -> i64 {
    100
}

/// `?skip=&limit=` window shared by every list endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn validate(self) -> Result<Self, ExpoError> {
        if self.skip < 0 || self.limit < 0 {
            return Err(ExpoError::Validation(
                "skip and limit must be non-negative".into(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: i64, window: Pagination, items: Vec<T>) -> Self {
        Self {
            total,
            skip: window.skip,
            limit: window.limit,
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            skip: self.skip,
            limit: self.limit,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
