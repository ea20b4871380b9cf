//! Checks model-supplied tool arguments against the tool's declared parameter schema.
//!
//! Only the subset of JSON schema that tool definitions use is understood: `type`,
//! `properties`, `required` and `additionalProperties: false`. Anything else is ignored.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentViolation {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: ExpectedType,
        actual: &'static str,
    },

    #[error("unexpected field '{0}'")]
    UnexpectedField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedType(Vec<String>);

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" or "))
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64() || is_integral_float(value),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keywords are not ours to enforce.
        _ => true,
    }
}

// Models regularly send `5.0` where an integer is declared.
fn is_integral_float(value: &Value) -> bool {
    value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn declared_types(schema: &Value) -> Option<Vec<String>> {
    match schema.get("type")? {
        Value::String(t) => Some(vec![t.clone()]),
        Value::Array(types) => Some(
            types
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

/// Returns every violation found, in a stable order: shape, then required fields in declared
/// order, then provided fields in key order.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), Vec<ArgumentViolation>> {
    let Some(object) = args.as_object() else {
        return Err(vec![ArgumentViolation::NotAnObject(json_type_name(args))]);
    };

    let mut violations = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if object.get(field).is_none_or(Value::is_null) {
                violations.push(ArgumentViolation::MissingField(field.to_string()));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();

    for key in keys {
        let value = &object[key];
        match properties.and_then(|p| p.get(key)) {
            Some(property) => {
                if value.is_null() {
                    continue;
                }
                if let Some(types) = declared_types(property)
                    && !types.is_empty()
                    && !types.iter().any(|t| matches_type(value, t))
                {
                    violations.push(ArgumentViolation::WrongType {
                        field: key.clone(),
                        expected: ExpectedType(types),
                        actual: json_type_name(value),
                    });
                }
            }
            None if closed => violations.push(ArgumentViolation::UnexpectedField(key.clone())),
            None => {}
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
