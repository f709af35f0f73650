//! Envelope comment phrasing.
//!
//! Comments are read by people and matched by downstream tooling, so every
//! outcome uses one fixed sentence.

use crate::tags::TagDiff;

/// `Created <type> '<name>'`
pub fn created(resource_type: &str, name: &str) -> String {
    format!("Created {resource_type} '{name}'")
}

/// `Would create <type> '<name>'`
pub fn would_create(resource_type: &str, name: &str) -> String {
    format!("Would create {resource_type} '{name}'")
}

/// `Updated <type> '<name>'`
pub fn updated(resource_type: &str, name: &str) -> String {
    format!("Updated {resource_type} '{name}'")
}

/// `Would update <type> '<name>'`
pub fn would_update(resource_type: &str, name: &str) -> String {
    format!("Would update {resource_type} '{name}'")
}

/// `Deleted <type> '<name>'`
pub fn deleted(resource_type: &str, name: &str) -> String {
    format!("Deleted {resource_type} '{name}'")
}

/// `Would delete <type> '<name>'`
pub fn would_delete(resource_type: &str, name: &str) -> String {
    format!("Would delete {resource_type} '{name}'")
}

/// `<type> '<name>' already absent`
pub fn already_absent(resource_type: &str, name: &str) -> String {
    format!("{resource_type} '{name}' already absent")
}

/// `<type> '<name>' already exists`
pub fn already_exists(resource_type: &str, name: &str) -> String {
    format!("{resource_type} '{name}' already exists")
}

/// `Get <type> '<name>' result is empty`
pub fn get_empty(resource_type: &str, name: &str) -> String {
    format!("Get {resource_type} '{name}' result is empty")
}

/// `Update tags: Add keys [..] Remove keys [..]`
pub fn update_tags(diff: &TagDiff) -> String {
    format!("Update tags: {}", tag_keys(diff))
}

/// `Would update tags: Add keys [..] Remove keys [..]`
pub fn would_update_tags(diff: &TagDiff) -> String {
    format!("Would update tags: {}", tag_keys(diff))
}

fn tag_keys(diff: &TagDiff) -> String {
    let add: Vec<&String> = diff.to_add.keys().collect();
    let remove: Vec<&String> = diff.to_remove.keys().collect();
    format!("Add keys {add:?} Remove keys {remove:?}")
}
