//! Parameter validation.
//!
//! Validation runs before any remote call. It checks a [`DesiredState`]
//! against the binding's [`ParameterSchema`] and, once a diff is known,
//! rejects changes to create-only parameters.
//!
//! # Example
//!
//! ```
//! use reconcile_sdk::schema::{Attribute, ParameterSchema};
//! use reconcile_sdk::types::DesiredState;
//! use reconcile_sdk::validation::validate;
//! use serde_json::json;
//!
//! let schema = ParameterSchema::new()
//!     .with_attribute("cidr_block", Attribute::required_string())
//!     .with_attribute("map_public_ip_on_launch", Attribute::optional_bool());
//!
//! let desired = DesiredState::new("subnet-a")
//!     .with_attribute("cidr_block", json!("10.0.0.0/24"))
//!     .with_attribute("map_public_ip_on_launch", json!("yes"));
//! let diagnostics = validate(&schema, &desired);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("map_public_ip_on_launch"));
//! ```

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::diff::Diff;
use crate::schema::{Attribute, AttributeType, Diagnostic, ParameterSchema};
use crate::types::{json_type_name, DesiredState};

/// Validate a desired state against a schema.
///
/// Returns errors and warnings. An empty list means the state is valid.
///
/// # Validation Rules
///
/// - Required parameters must be supplied
/// - Computed attributes may not be supplied
/// - Supplied values must match the declared type
/// - Parameters declared as conflicting may not be supplied together
/// - Undeclared parameters are a warning, or an error for strict schemas
pub fn validate(schema: &ParameterSchema, desired: &DesiredState) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let supplied = &desired.attributes;

    for (name, attr) in &schema.attributes {
        validate_attribute(name, attr, supplied, &mut diagnostics);
    }

    // Conflicts may be declared on either side; report each pair once.
    let mut conflicts = BTreeSet::new();
    for (name, attr) in &schema.attributes {
        if !supplied.contains_key(name) {
            continue;
        }
        for other in attr.conflicts_with.iter().filter(|o| supplied.contains_key(*o)) {
            let pair = if name < other { (name, other) } else { (other, name) };
            conflicts.insert(pair);
        }
    }
    for (first, second) in conflicts {
        diagnostics.push(
            Diagnostic::error(format!(
                "Parameters '{}' and '{}' cannot be used together",
                first, second
            ))
            .with_attribute(first.clone()),
        );
    }

    for name in supplied.keys() {
        if schema.attribute(name).is_some() {
            continue;
        }
        let diagnostic = if schema.strict {
            Diagnostic::error(format!("Unsupported parameter '{}'", name))
        } else {
            Diagnostic::warning(format!("Unknown parameter '{}'", name))
                .with_detail("It is passed through unchecked")
        };
        diagnostics.push(diagnostic.with_attribute(name.clone()));
    }

    diagnostics
}

/// Validate and return `Err` with only the error diagnostics if any exist.
pub fn validate_result(
    schema: &ParameterSchema,
    desired: &DesiredState,
) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
    let (errors, warnings): (Vec<_>, Vec<_>) = validate(schema, desired)
        .into_iter()
        .partition(Diagnostic::is_error);
    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors)
    }
}

/// Whether a desired state has no validation errors.
pub fn is_valid(schema: &ParameterSchema, desired: &DesiredState) -> bool {
    validate(schema, desired).iter().all(|d| !d.is_error())
}

/// Errors for create-only parameters that a diff would change.
pub fn validate_update(schema: &ParameterSchema, diff: &Diff) -> Vec<Diagnostic> {
    diff.attributes
        .values()
        .filter(|change| {
            schema
                .attribute(&change.path)
                .is_some_and(|attr| attr.flags.create_only)
        })
        .map(|change| {
            Diagnostic::error(format!(
                "Parameter '{}' cannot be changed after creation",
                change.path
            ))
            .with_detail(format!(
                "current value {}, desired value {}",
                render(change.before.as_ref()),
                render(change.after.as_ref())
            ))
            .with_attribute(change.path.clone())
        })
        .collect()
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    supplied: &Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match supplied.get(name) {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required parameter '{}'", name))
                        .with_attribute(name),
                );
            }
        },
        Some(value) => {
            if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Parameter '{}' is read-only", name))
                        .with_detail("Its value is assigned by the cloud provider")
                        .with_attribute(name),
                );
                return;
            }
            validate_attribute_type(&attr.attr_type, value, name, diagnostics);
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
        AttributeType::Document => match value {
            Value::Object(_) | Value::Array(_) => {},
            Value::String(text) => {
                if serde_json::from_str::<Value>(text).is_err() {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid JSON document for '{}'", path))
                            .with_attribute(path),
                    );
                }
            },
            other => diagnostics.push(type_error(path, "document", other)),
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            let attr_path = format!("{}.{}", path, name);
            validate_attribute_type(attr_type, value, &attr_path, diagnostics);
        }
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, json_type_name(value)))
        .with_attribute(path)
}

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unset>".to_string(), Value::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Differ;
    use crate::schema::{AttributeFlags, DiagnosticSeverity};
    use crate::types::ResourceState;
    use serde_json::json;

    fn subnet_schema() -> ParameterSchema {
        ParameterSchema::new()
            .with_attribute("vpc_id", Attribute::required_string().create_only())
            .with_attribute("cidr_block", Attribute::optional_string().create_only())
            .with_attribute(
                "ipv6_native",
                Attribute::optional_bool().conflicts_with("cidr_block"),
            )
            .with_attribute("map_public_ip_on_launch", Attribute::optional_bool())
            .with_attribute("subnet_arn", Attribute::computed_string())
    }

    #[test]
    fn test_validate_required() {
        let diagnostics = validate(&subnet_schema(), &DesiredState::new("s1"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
        assert!(diagnostics[0].summary.contains("vpc_id"));
    }

    #[test]
    fn test_validate_valid_state() {
        let desired = DesiredState::new("s1")
            .with_attribute("vpc_id", json!("vpc-1"))
            .with_attribute("cidr_block", json!("10.0.0.0/24"));
        assert!(validate(&subnet_schema(), &desired).is_empty());
        assert!(is_valid(&subnet_schema(), &desired));
    }

    #[test]
    fn test_validate_conflicts_reported_once() {
        let desired = DesiredState::new("s1")
            .with_attribute("vpc_id", json!("vpc-1"))
            .with_attribute("cidr_block", json!("10.0.0.0/24"))
            .with_attribute("ipv6_native", json!(true));
        let diagnostics = validate(&subnet_schema(), &desired);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("cannot be used together"));
    }

    #[test]
    fn test_validate_computed_rejected() {
        let desired = DesiredState::new("s1")
            .with_attribute("vpc_id", json!("vpc-1"))
            .with_attribute("subnet_arn", json!("arn:aws:ec2:::subnet/s1"));
        let diagnostics = validate(&subnet_schema(), &desired);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("subnet_arn"));
    }

    #[test]
    fn test_unknown_parameters() {
        let desired = DesiredState::new("s1")
            .with_attribute("vpc_id", json!("vpc-1"))
            .with_attribute("colour", json!("blue"));
        let diagnostics = validate(&subnet_schema(), &desired);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert!(validate_result(&subnet_schema(), &desired).is_ok());

        let errors = validate_result(&subnet_schema().strict(), &desired).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_validate_nested_types() {
        let schema = ParameterSchema::new()
            .with_attribute(
                "ingress",
                Attribute::new(
                    AttributeType::list(AttributeType::object(HashMap::from([
                        ("port".to_string(), AttributeType::Int64),
                        ("cidr".to_string(), AttributeType::String),
                    ]))),
                    AttributeFlags::optional(),
                ),
            )
            .with_attribute("policy", Attribute::optional_document());

        let desired = DesiredState::new("sg")
            .with_attribute("ingress", json!([{"port": 443}, {"port": "80", "cidr": 1}]))
            .with_attribute("policy", json!("{not json"));
        let mut paths: Vec<_> = validate(&schema, &desired)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["ingress.1.cidr", "ingress.1.port", "policy"]);
    }

    #[test]
    fn test_validate_update_rejects_create_only_change() {
        let current = ResourceState::new("s1", "subnet-1")
            .with_attribute("vpc_id", json!("vpc-1"))
            .with_attribute("map_public_ip_on_launch", json!(false));
        let desired = DesiredState::new("s1")
            .with_attribute("vpc_id", json!("vpc-2"))
            .with_attribute("map_public_ip_on_launch", json!(true));
        let diff = Differ::new().diff(&current, &desired);

        let diagnostics = validate_update(&subnet_schema(), &diff);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("vpc_id"));
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("\"vpc-2\""));
    }

    #[test]
    fn test_int64_accepts_integral_floats() {
        assert!(is_int64(&json!(5)));
        assert!(is_int64(&json!(5.0)));
        assert!(!is_int64(&json!(5.5)));
        assert!(!is_int64(&json!("5")));
    }
}
