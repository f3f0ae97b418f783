//! Validation of JSON inputs against a resource [`Schema`].
//!
//! # Example
//!
//! ```
//! use xyz_provider::schema::{Schema, Attribute};
//! use xyz_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("petName", Attribute::required_bool())
//!     .with_attribute("passwordLength", Attribute::optional_int64());
//!
//! let diagnostics = validate(&schema, &json!({"petName": true, "passwordLength": 24}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"petName": true, "passwordLength": "long"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("passwordLength".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are outputs and are not checked
/// - Attribute types must match the schema
/// - Attributes the schema does not know produce a warning
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Treat a missing object as an empty one so required inputs are reported.
            check_attributes(schema, &serde_json::Map::new(), &mut diagnostics);
            return diagnostics;
        },
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        },
    };

    check_attributes(schema, obj, &mut diagnostics);

    let mut unknown: Vec<&String> = obj
        .keys()
        .filter(|key| !schema.block.attributes.contains_key(*key))
        .collect();
    unknown.sort();
    for key in unknown {
        diagnostics.push(
            Diagnostic::warning(format!("Unknown attribute '{}'", key))
                .with_detail("This attribute is not part of the resource schema and is ignored")
                .with_attribute(key.as_str()),
        );
    }

    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if no errors were found.
///
/// Warnings are not treated as failures.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let errors: Vec<Diagnostic> = validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check if a JSON value has no validation errors against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate_result(schema, value).is_ok()
}

fn check_attributes(
    schema: &Schema,
    obj: &serde_json::Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &schema.block.attributes[name];
        validate_attribute(attr, obj.get(name), name, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Outputs are set by the provider
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let matches = match attr.attr_type {
                AttributeType::String => v.is_string(),
                AttributeType::Int64 => is_int64(v),
                AttributeType::Bool => v.is_boolean(),
            };
            if !matches {
                diagnostics.push(type_error(path, &attr.attr_type, v));
            }
        },
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_type_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.is_i64() {
                true
            } else if let Some(f) = n.as_f64() {
                // Hosts that speak JSON through float64 send 16 as 16.0
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &AttributeType, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected_type_name(expected),
            value_type_name(got)
        ))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, DiagnosticSeverity, Schema};
    use serde_json::json;

    fn login_like_schema() -> Schema {
        Schema::v0()
            .with_attribute("petName", Attribute::required_bool())
            .with_attribute("passwordLength", Attribute::optional_int64())
            .with_attribute("username", Attribute::computed_string())
    }

    #[test]
    fn test_validate_required_bool() {
        let schema = login_like_schema();

        let diagnostics = validate(&schema, &json!({"petName": false}));
        assert!(diagnostics.is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("petName".to_string()));
        assert!(diagnostics[0].summary.contains("Missing required"));

        let diagnostics = validate(&schema, &json!({"petName": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"petName": "yes"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected bool, got string"));
    }

    #[test]
    fn test_validate_optional_int64() {
        let schema = login_like_schema();

        assert!(validate(&schema, &json!({"petName": true, "passwordLength": 32})).is_empty());
        assert!(validate(&schema, &json!({"petName": true, "passwordLength": null})).is_empty());
        assert!(validate(&schema, &json!({"petName": true, "passwordLength": 32.0})).is_empty());

        let diagnostics = validate(&schema, &json!({"petName": true, "passwordLength": 12.5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("passwordLength".to_string()));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = login_like_schema();

        // Outputs echoed back by the host are not type-checked
        let diagnostics = validate(&schema, &json!({"petName": true, "username": 123}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_unknown_attribute_warns() {
        let schema = login_like_schema();

        let diagnostics = validate(&schema, &json!({"petName": true, "colour": "blue"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostics[0].attribute, Some("colour".to_string()));
        assert!(is_valid(&schema, &json!({"petName": true, "colour": "blue"})));
    }

    #[test]
    fn test_validate_multiple_errors_in_stable_order() {
        let schema = login_like_schema();

        let diagnostics = validate(&schema, &json!({"petName": 1, "passwordLength": "x"}));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute, Some("passwordLength".to_string()));
        assert_eq!(diagnostics[1].attribute, Some("petName".to_string()));
    }

    #[test]
    fn test_validate_null_root_reports_required() {
        let schema = login_like_schema();

        let diagnostics = validate(&schema, &Value::Null);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("petName".to_string()));
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = login_like_schema();

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = login_like_schema();

        assert!(validate_result(&schema, &json!({"petName": true})).is_ok());
        let errors = validate_result(&schema, &json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
