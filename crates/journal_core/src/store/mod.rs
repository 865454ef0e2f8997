//! Write-through stores that mirror the signed-in user's records in memory.
//!
//! Every action resolves the session, performs the remote round trip and only
//! then touches memory. Failures are recorded on the store rather than
//! returned, and a full reload resynchronizes the in-memory collection.

pub mod goals;
mod mirror;
pub mod tasks;

use crate::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub use goals::GoalStore;
pub use tasks::TaskStore;

pub const TASKS_COLLECTION: &str = "tasks";
pub const GOALS_COLLECTION: &str = "goals";
pub const OWNER_FIELD: &str = "userId";

/// Last failure recorded by a store action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub action: &'static str,
    pub source: AppError,
}

impl StoreFailure {
    pub fn code(&self) -> &'static str {
        self.source.code()
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to {}: {}", self.action, self.source)
    }
}

/// Document identifiers must be non-blank and cannot contain a path separator.
pub(crate) fn validate_id<'a>(id: &'a str, kind: &str) -> Result<&'a str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_argument(format!("{kind} id is required")));
    }
    if trimmed.contains('/') {
        return Err(AppError::invalid_argument(format!("invalid {kind} id: {id}")));
    }
    Ok(trimmed)
}

pub(crate) fn document_fields<T: Serialize>(document: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(document)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::invalid_data("document must serialize to an object")),
    }
}
