//! Catalog validation.
//!
//! Turns an untyped JSON document into the ordered item sequence of one
//! generation. Order is preserved and later used as the ranking tie-break.

use std::collections::HashSet;

use serde_json::Value;

use crate::AssessmentItem;

pub const REQUIRED_FIELDS: [&str; 6] = [
    "id",
    "name",
    "description",
    "tags",
    "category",
    "recommended_roles",
];

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("not a list")]
    NotAList,
    #[error("empty")]
    Empty,
    #[error("missing fields: {0}")]
    MissingFields(String),
    #[error("invalid item at position {position}: {reason}")]
    InvalidItem { position: usize, reason: String },
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("empty query")]
    EmptyQuery,
    #[error("top_k must be positive")]
    NonPositiveTopK,
}

/// Validates a raw catalog document.
///
/// Every element is checked for required fields before any of them is
/// deserialized, so the error lists all offending items at once.
pub fn validate(raw: &Value) -> Result<Vec<AssessmentItem>, ValidationError> {
    let entries = raw.as_array().ok_or(ValidationError::NotAList)?;
    if entries.is_empty() {
        return Err(ValidationError::Empty);
    }

    let problems: Vec<String> = entries
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let missing = missing_fields(entry);
            (!missing.is_empty()).then(|| format!("item {position}: {}", missing.join(", ")))
        })
        .collect();
    if !problems.is_empty() {
        return Err(ValidationError::MissingFields(problems.join("; ")));
    }

    let items = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            serde_json::from_value::<AssessmentItem>(entry.clone()).map_err(|err| {
                ValidationError::InvalidItem {
                    position,
                    reason: err.to_string(),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    validate_items(items)
}

/// Applies the catalog-level checks to already typed items.
pub fn validate_items(items: Vec<AssessmentItem>) -> Result<Vec<AssessmentItem>, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in &items {
        if !seen.insert(item.id.as_str()) {
            return Err(ValidationError::DuplicateId(item.id.clone()));
        }
    }

    Ok(items)
}

fn missing_fields(entry: &Value) -> Vec<&'static str> {
    match entry.as_object() {
        Some(object) => REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| object.get(*field).is_none_or(Value::is_null))
            .collect(),
        None => REQUIRED_FIELDS.to_vec(),
    }
}
