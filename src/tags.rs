//! Tag maps and tag diffing.
//!
//! Tags are diffed key by key so that an update only touches the keys that
//! actually changed. Unrelated tags on the resource are never removed by an
//! update.
//!
//! # Example
//!
//! ```
//! use reconcile_sdk::tags::{diff_tags, Tags};
//!
//! let current: Tags = [("a", "1"), ("stale", "x")]
//!     .into_iter()
//!     .map(|(k, v)| (k.to_string(), v.to_string()))
//!     .collect();
//! let desired: Tags = [("a", "1"), ("b", "2")]
//!     .into_iter()
//!     .map(|(k, v)| (k.to_string(), v.to_string()))
//!     .collect();
//!
//! let diff = diff_tags(&current, &desired);
//! assert_eq!(diff.to_add.keys().collect::<Vec<_>>(), ["b"]);
//! assert_eq!(diff.to_remove.keys().collect::<Vec<_>>(), ["stale"]);
//! assert_eq!(diff.apply(&current), desired);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ReconcileError;
use crate::types::json_type_name;

/// A tag map. Ordering carries no meaning; it only keeps output stable.
pub type Tags = BTreeMap<String, String>;

/// The tag changes needed to go from one tag map to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDiff {
    /// Tags to create or overwrite, with their new values.
    pub to_add: Tags,
    /// Tags to delete, with their current values.
    pub to_remove: Tags,
}

impl TagDiff {
    /// Whether no tag needs to change.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Apply this diff to a tag map.
    pub fn apply(&self, tags: &Tags) -> Tags {
        let mut result = tags.clone();
        for key in self.to_remove.keys() {
            result.remove(key);
        }
        for (key, value) in &self.to_add {
            result.insert(key.clone(), value.clone());
        }
        result
    }

    /// The `[{"Key": .., "Value": ..}]` list of tags to add.
    pub fn add_list(&self) -> Vec<Value> {
        to_list(&self.to_add)
    }

    /// The `[{"Key": ..}]` list of tag keys to remove.
    pub fn remove_key_list(&self) -> Vec<Value> {
        self.to_remove.keys().map(|key| json!({ "Key": key })).collect()
    }
}

/// Compute the changes needed to turn `current` into `desired`.
///
/// A key whose value changed only appears in `to_add`: writing a tag
/// overwrites its previous value.
pub fn diff_tags(current: &Tags, desired: &Tags) -> TagDiff {
    let mut diff = TagDiff::default();
    for (key, value) in desired {
        if current.get(key) != Some(value) {
            diff.to_add.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in current {
        if !desired.contains_key(key) {
            diff.to_remove.insert(key.clone(), value.clone());
        }
    }
    diff
}

/// Convert a tag map to the AWS list form.
pub fn to_list(tags: &Tags) -> Vec<Value> {
    tags.iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect()
}

/// Convert an AWS tag list to a map.
///
/// Entries without a `Key` are skipped. A missing `Value` becomes the empty
/// string.
pub fn from_list(list: &[Value]) -> Tags {
    let mut tags = Tags::new();
    for entry in list {
        match entry.get("Key").and_then(Value::as_str) {
            Some(key) => {
                let value = entry
                    .get("Value")
                    .map(scalar_to_string)
                    .unwrap_or_default();
                tags.insert(key.to_string(), value);
            },
            None => {
                tracing::warn!(tag = %entry, "tag is not a 'Key'/'Value' pair, skipping");
            },
        }
    }
    tags
}

/// Parse tags given either as a map or as an AWS tag list.
pub fn from_value(value: Value) -> Result<Tags, ReconcileError> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(&value)))
            .collect()),
        Value::Array(list) => Ok(from_list(&list)),
        Value::Null => Ok(Tags::new()),
        other => Err(ReconcileError::ValidationConflict(format!(
            "tags must be a map or a list of Key/Value pairs, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Convert a tag map to a JSON object.
pub fn to_value(tags: &Tags) -> Value {
    Value::Object(
        tags.iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
