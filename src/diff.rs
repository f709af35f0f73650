//! Desired-versus-current state comparison.
//!
//! The [`Differ`] only looks at attributes the caller supplied. Each attribute
//! is compared according to its [`Comparison`] policy, so list-valued
//! attributes whose order the API does not preserve can be compared as sets.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tags::{diff_tags, TagDiff};
use crate::types::{AttributeChange, DesiredState, ResourceState};

/// How two values of one attribute are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Plain JSON equality.
    #[default]
    Exact,
    /// Arrays are compared as multisets, at every nesting level.
    Unordered,
    /// The value is a JSON document, possibly encoded as a string. Object keys
    /// and lists of strings are compared without regard to order.
    Json,
}

impl Comparison {
    /// Whether `current` and `desired` are equal under this policy.
    pub fn equal(self, current: &Value, desired: &Value) -> bool {
        match self {
            Comparison::Exact => current == desired,
            Comparison::Unordered => normalize_unordered(current) == normalize_unordered(desired),
            Comparison::Json => normalize_document(current) == normalize_document(desired),
        }
    }
}

/// The changes needed to bring a resource to its desired state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Changed attributes by name.
    pub attributes: BTreeMap<String, AttributeChange>,
    /// Tag changes, if tags were supplied and differ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagDiff>,
}

impl Diff {
    /// Whether nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.tags.as_ref().map_or(true, TagDiff::is_empty)
    }

    /// Whether any non-tag attribute needs to change.
    pub fn has_attribute_changes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// The tag diff, if it is non-empty.
    pub fn tag_changes(&self) -> Option<&TagDiff> {
        self.tags.as_ref().filter(|diff| !diff.is_empty())
    }

    /// Names of the changed attributes.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    /// The desired values of the changed attributes.
    pub fn desired_values(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .filter_map(|(name, change)| change.after.clone().map(|v| (name.clone(), v)))
            .collect()
    }
}

/// Computes [`Diff`]s using per-attribute comparison policies.
#[derive(Debug, Clone, Default)]
pub struct Differ {
    comparisons: HashMap<String, Comparison>,
}

impl Differ {
    /// A differ that compares every attribute exactly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `comparison` for the attribute `name`.
    pub fn with_comparison(mut self, name: impl Into<String>, comparison: Comparison) -> Self {
        self.comparisons.insert(name.into(), comparison);
        self
    }

    /// The policy used for `name`.
    pub fn comparison(&self, name: &str) -> Comparison {
        self.comparisons.get(name).copied().unwrap_or_default()
    }

    /// Compare `current` against `desired`.
    ///
    /// Attributes absent from `desired` are never reported as changed, and
    /// tags are only compared when `desired.tags` is set.
    pub fn diff(&self, current: &ResourceState, desired: &DesiredState) -> Diff {
        let mut diff = Diff::default();
        for (name, wanted) in &desired.attributes {
            match current.attribute(name) {
                Some(have) if self.comparison(name).equal(have, wanted) => {},
                Some(have) => {
                    diff.attributes.insert(
                        name.clone(),
                        AttributeChange::modified(name.clone(), have.clone(), wanted.clone()),
                    );
                },
                None => {
                    diff.attributes.insert(
                        name.clone(),
                        AttributeChange::added(name.clone(), wanted.clone()),
                    );
                },
            }
        }
        if let Some(tags) = &desired.tags {
            let tag_diff = diff_tags(&current.tags, tags);
            if !tag_diff.is_empty() {
                diff.tags = Some(tag_diff);
            }
        }
        diff
    }

    /// The state `current` would be in after `diff` is applied.
    pub fn plan_state(&self, current: &ResourceState, diff: &Diff) -> ResourceState {
        let mut planned = current.clone();
        for (name, value) in diff.desired_values() {
            planned.attributes.insert(name, value);
        }
        if let Some(tag_diff) = &diff.tags {
            planned.tags = tag_diff.apply(&current.tags);
        }
        planned
    }
}

/// Top-level keys whose values differ between two states, as `{old, new}`.
///
/// Either side may be absent (creation or deletion), in which case every key
/// of the other side is reported.
pub fn changes(old: Option<&ResourceState>, new: Option<&ResourceState>) -> Option<Value> {
    let old = old.map(ResourceState::to_value).unwrap_or(Value::Null);
    let new = new.map(ResourceState::to_value).unwrap_or(Value::Null);
    let empty = Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut old_changes = Map::new();
    let mut new_changes = Map::new();
    for (key, value) in old_map {
        if new_map.get(key) != Some(value) {
            old_changes.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in new_map {
        if old_map.get(key) != Some(value) {
            new_changes.insert(key.clone(), value.clone());
        }
    }

    if old_changes.is_empty() && new_changes.is_empty() {
        return None;
    }
    let mut result = Map::new();
    result.insert("old".to_string(), Value::Object(old_changes));
    result.insert("new".to_string(), Value::Object(new_changes));
    Some(Value::Object(result))
}

/// Recursively sort arrays by their canonical encoding.
fn normalize_unordered(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(normalize_unordered).collect();
            items.sort_by_cached_key(|item| item.to_string());
            Value::Array(items)
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize_unordered(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Parse string-encoded documents and sort lists made only of strings.
fn normalize_document(value: &Value) -> Value {
    fn sort_string_lists(value: Value) -> Value {
        match value {
            Value::Array(items) => {
                let mut items: Vec<Value> = items.into_iter().map(sort_string_lists).collect();
                if items.iter().all(Value::is_string) {
                    items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                }
                Value::Array(items)
            },
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, sort_string_lists(value)))
                    .collect(),
            ),
            other => other,
        }
    }

    let parsed = match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    };
    sort_string_lists(parsed)
}
