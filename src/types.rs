//! Core data model shared by fetchers, differs, mutators and the orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReconcileError;
use crate::tags::{self, Tags};
use crate::waiter::TimeoutConfig;

/// Placeholder `resource_id` of a simulated state for a resource that has not
/// been created yet.
pub const RESOURCE_ID_KNOWN_AFTER_PRESENT: &str = "resource_id_known_after_present";

/// Parameter keys lifted out of the attribute map by [`DesiredState::from_params`].
const RESERVED_PARAMS: &[&str] = &["name", "resource_id", "tags"];

/// A snapshot of a remote resource.
///
/// Serializes flat: `name`, `resource_id` and `tags` next to the
/// resource-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// The user-assigned name.
    pub name: String,
    /// The provider-assigned identifier.
    pub resource_id: String,
    /// Tags on the resource.
    #[serde(default)]
    pub tags: Tags,
    /// Resource-type-specific attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    /// Create a state with no tags or attributes.
    pub fn new(name: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_id: resource_id.into(),
            tags: Tags::new(),
            attributes: Map::new(),
        }
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Add one tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The flat JSON representation of this state.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "resource_id".to_string(),
            Value::String(self.resource_id.clone()),
        );
        map.insert("tags".to_string(), tags::to_value(&self.tags));
        for (key, value) in &self.attributes {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// What the caller wants a resource to look like.
///
/// `attributes` only holds parameters the caller actually supplied; an omitted
/// parameter means "leave as-is". `tags: None` likewise leaves tags untouched,
/// while `Some(empty)` removes every tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    /// The user-assigned name.
    pub name: String,
    /// The provider-assigned identifier, if the resource is already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Desired tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    /// Explicitly supplied resource-specific attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DesiredState {
    /// Create a desired state with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the resource id.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Set the desired tags.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Add one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Build a desired state from the JSON parameters a state call receives.
    ///
    /// `null` values are treated as not supplied. `tags` may be given either
    /// as a map or in the `[{"Key": .., "Value": ..}]` list form.
    pub fn from_params(name: impl Into<String>, params: Value) -> Result<Self, ReconcileError> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ReconcileError::ValidationConflict(format!(
                    "parameters must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        params.retain(|_, value| !value.is_null());

        let resource_id = match params.remove("resource_id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            Some(Value::String(_)) | None => None,
            Some(other) => {
                return Err(ReconcileError::ValidationConflict(format!(
                    "resource_id must be a string, got {}",
                    json_type_name(&other)
                )))
            }
        };
        let tags = params.remove("tags").map(tags::from_value).transpose()?;
        for key in RESERVED_PARAMS {
            params.remove(*key);
        }

        Ok(Self {
            name: name.into(),
            resource_id,
            tags,
            attributes: params,
        })
    }

    /// The state this desired state would produce once created.
    pub fn to_planned_state(&self, resource_id: impl Into<String>) -> ResourceState {
        ResourceState {
            name: self.name.clone(),
            resource_id: resource_id.into(),
            tags: self.tags.clone().unwrap_or_default(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Per-call context handed down by the orchestration engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Dry-run mode: compute the outcome without mutating anything.
    #[serde(default)]
    pub test: bool,
    /// Waiter overrides for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
    /// Re-create a resource whose `resource_id` no longer exists remotely
    /// instead of failing.
    #[serde(default)]
    pub recreate_if_deleted: bool,
}

impl Context {
    /// A context with all defaults (real run, no overrides).
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle dry-run mode.
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// Set waiter overrides.
    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Toggle re-creation of resources deleted out of band.
    pub fn with_recreate_if_deleted(mut self, recreate: bool) -> Self {
        self.recreate_if_deleted = recreate;
        self
    }

    /// Parse the engine's JSON `ctx`. `null` yields the defaults.
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// A change to a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute name.
    pub path: String,
    /// The current value (None if the resource does not have it).
    pub before: Option<Value>,
    /// The desired value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for an attribute the resource does not have yet.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
