//! `content_json` escape hatch
//!
//! A form's items may be supplied as a raw Forms API item array instead of
//! structured blocks. Drift is judged on the canonical form of the document
//! (sorted keys, no insignificant whitespace) so templated sources that
//! reorder keys do not produce spurious diffs.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::model::FormModel;
use crate::api::models::forms::{CreateItemRequest, ItemPayload, Location, Request};

#[derive(Debug, Error)]
pub enum ContentJsonError {
    #[error("content_json is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("content_json must be a JSON array of item objects")]
    NotAnArray,
    #[error("content_json element {0} is not an object")]
    NotAnObject(usize),
}

pub fn parse_items(content: &str) -> Result<Vec<Value>, ContentJsonError> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        return Err(ContentJsonError::NotAnArray);
    };
    if let Some(index) = items.iter().position(|item| !item.is_object()) {
        return Err(ContentJsonError::NotAnObject(index));
    }
    Ok(items)
}

/// One CreateItem per element, in array order
pub fn create_requests(content: &str) -> Result<Vec<Request>, ContentJsonError> {
    Ok(parse_items(content)?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Request::CreateItem(CreateItemRequest {
                item: ItemPayload::Raw(item),
                location: Location { index },
            })
        })
        .collect())
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Re-serialize with sorted keys and minimal whitespace
pub fn canonicalize(content: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(content)?;
    serde_json::to_string(&sort_keys(value))
}

/// Hex SHA-256 of the canonical document
pub fn canonical_hash(content: &str) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(content)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Semantic equality; unparseable documents never match
pub fn equivalent(a: &str, b: &str) -> bool {
    match (canonical_hash(a), canonical_hash(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Plan modifier: when the planned document is semantically the stored one,
/// plan the stored text so no diff is shown. Returns whether it applied.
pub fn suppress_equivalent_diff(plan: &mut FormModel, state: &FormModel) -> bool {
    let (Some(planned), Some(stored)) = (plan.content_json.as_ref(), state.content_json.as_ref()) else {
        return false;
    };
    if planned == stored || !equivalent(planned, stored) {
        return false;
    }
    plan.content_json = Some(stored.clone());
    true
}
