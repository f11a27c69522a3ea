use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::pocketbase::Filter;

pub mod cliente;
pub mod contabilidad;
pub mod equipo;
pub mod evento;
pub mod persona;
pub mod proveedor;

/// A PocketBase collection exposed through the generic CRUD routes.
pub trait Resource: Send + Sync + 'static {
    /// Collection name; also the path segment under `/api`.
    const COLLECTION: &'static str;
    /// Singular name used in messages.
    const LABEL: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;

    type Record: DeserializeOwned + Serialize + Send + 'static;
    type Input: DeserializeOwned + Serialize + Send + Sync + 'static;

    /// Checks required fields and canonicalizes values before a create.
    fn validate_new(input: &mut Self::Input) -> Result<(), AppError>;

    /// Same for a partial update: only fields present are checked.
    fn validate_patch(input: &mut Self::Input) -> Result<(), AppError>;

    /// Collection-specific query-string filters.
    fn filters(_params: &HashMap<String, String>, filter: Filter) -> Result<Filter, AppError> {
        Ok(filter)
    }
}

/// Trims a required field, failing when it is absent or blank.
pub(crate) fn require(field: &str, value: &mut Option<String>) -> Result<(), AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => {
            *value = Some(v.to_string());
            Ok(())
        }
        _ => Err(AppError::required(field)),
    }
}

/// For updates: a required field may be omitted but not blanked.
pub(crate) fn require_if_present(field: &str, value: &mut Option<String>) -> Result<(), AppError> {
    if value.is_some() {
        require(field, value)
    } else {
        Ok(())
    }
}

pub(crate) fn trim(value: &mut Option<String>) {
    if let Some(v) = value {
        let trimmed = v.trim();
        if trimmed.len() != v.len() {
            *v = trimmed.to_string();
        }
    }
}

/// `hasta=2026-01-31` should include the whole day.
pub(crate) fn end_of_day(date: &str) -> String {
    if date.len() == 10 {
        format!("{date} 23:59:59.999Z")
    } else {
        date.to_string()
    }
}

pub(crate) fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}
