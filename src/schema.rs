//! Typed parameter schemas for resource bindings.
//!
//! A [`ParameterSchema`] lists the parameters a resource type accepts. It is
//! checked by [`validation`](crate::validation) before anything touches the
//! cloud, and it carries the per-attribute [`Comparison`] policies used by the
//! differ.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::diff::{Comparison, Differ};

/// The type of a parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit float.
    Float64,
    /// A boolean value.
    Bool,
    /// A homogeneous list.
    List(Box<AttributeType>),
    /// A homogeneous string-keyed map.
    Map(Box<AttributeType>),
    /// An object with fixed keys.
    Object(HashMap<String, AttributeType>),
    /// A JSON document, either as an object or as its string encoding
    /// (IAM policies, redrive policies).
    Document,
    /// Any value.
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Create an object type.
    pub fn object(attributes: HashMap<String, AttributeType>) -> Self {
        Self::Object(attributes)
    }
}

/// Describes how a parameter can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The parameter must be supplied.
    pub required: bool,
    /// The parameter may be supplied.
    pub optional: bool,
    /// The value is assigned by the cloud and cannot be supplied.
    pub computed: bool,
    /// The parameter can only be set at creation time.
    pub create_only: bool,
}

impl AttributeFlags {
    /// Flags for a required parameter.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Flags for an optional parameter.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Flags for a read-only attribute.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }
}

/// One parameter of a resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Usage flags.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameters that may not be supplied together with this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    /// How current and desired values are compared.
    #[serde(default)]
    pub comparison: Comparison,
}

impl Attribute {
    /// A parameter of `attr_type` with `flags`.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            conflicts_with: Vec::new(),
            comparison: Comparison::default(),
        }
    }

    /// A required string parameter.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// An optional string parameter.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A read-only string reported by the cloud.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// An optional integer parameter.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// An optional boolean parameter.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Create an optional JSON document attribute, compared as a document.
    pub fn optional_document() -> Self {
        Self::new(AttributeType::Document, AttributeFlags::optional())
            .with_comparison(Comparison::Json)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as settable only at creation.
    pub fn create_only(mut self) -> Self {
        self.flags.create_only = true;
        self
    }

    /// Declare that this attribute may not be combined with `other`.
    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    /// Set the comparison policy.
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }
}

/// The parameters a resource type accepts.
///
/// `name`, `resource_id` and `tags` are handled by the SDK and never need to
/// be declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameters by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Reject parameters that are not declared.
    #[serde(default)]
    pub strict: bool,
}

impl ParameterSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Reject undeclared parameters instead of warning about them.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Look up a parameter.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// A [`Differ`] using the declared comparison policies.
    pub fn differ(&self) -> Differ {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.comparison != Comparison::Exact)
            .fold(Differ::new(), |differ, (name, attr)| {
                differ.with_comparison(name.clone(), attr.comparison)
            })
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The call cannot proceed.
    Error,
    /// Worth reporting, but the call proceeds.
    Warning,
}

/// A validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The parameter path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the parameter path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic blocks the call.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }

    /// A one-line rendering suitable for an envelope comment.
    pub fn to_comment(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {}", self.summary, detail),
            None => self.summary.clone(),
        }
    }
}
