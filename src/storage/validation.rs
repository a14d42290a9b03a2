use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

pub const MAX_IDENTIFIER_LENGTH: usize = 250;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]+$").expect("identifier pattern is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum IdentifierError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} is longer than {MAX_IDENTIFIER_LENGTH} characters")]
    TooLong { kind: &'static str },

    #[error("{kind} '{input}' has invalid characters")]
    InvalidCharacters { kind: &'static str, input: String },
}

/// Accepts collection names and document keys made of ASCII letters, digits and `_`.
pub fn validate_identifier(kind: &'static str, input: &str) -> Result<(), IdentifierError> {
    if input.is_empty() {
        return Err(IdentifierError::Empty(kind));
    }
    if input.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong { kind });
    }
    if !IDENTIFIER.is_match(input) {
        return Err(IdentifierError::InvalidCharacters {
            kind,
            input: input.to_string(),
        });
    }
    Ok(())
}

pub trait SchemaValidator: Send + Sync {
    fn is_invalid(&self, value: &Value, schema: &Value) -> bool;
}

/// Structural subset of JSON Schema: `type`, `enum`, `required`, `properties`,
/// `additionalProperties: false` and `items`. Unknown keywords are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSchemaValidator;

impl SchemaValidator for BasicSchemaValidator {
    fn is_invalid(&self, value: &Value, schema: &Value) -> bool {
        !conforms(value, schema)
    }
}

fn conforms(value: &Value, schema: &Value) -> bool {
    let rules = match schema {
        Value::Null | Value::Bool(true) => return true,
        Value::Bool(false) => return false,
        Value::Object(rules) => rules,
        _ => return true,
    };

    if let Some(expected) = rules.get("type") {
        let allowed = match expected {
            Value::String(name) => matches_type(value, name),
            Value::Array(names) => names
                .iter()
                .filter_map(Value::as_str)
                .any(|name| matches_type(value, name)),
            _ => true,
        };
        if !allowed {
            return false;
        }
    }

    if let Some(Value::Array(choices)) = rules.get("enum")
        && !choices.contains(value)
    {
        return false;
    }

    if let Value::Object(fields) = value {
        if let Some(Value::Array(required)) = rules.get("required")
            && required
                .iter()
                .filter_map(Value::as_str)
                .any(|name| !fields.contains_key(name))
        {
            return false;
        }

        let properties = rules.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (name, field) in fields {
                match properties.get(name) {
                    Some(sub_schema) if !conforms(field, sub_schema) => return false,
                    Some(_) => {}
                    None if rules.get("additionalProperties") == Some(&Value::Bool(false)) => {
                        return false;
                    }
                    None => {}
                }
            }
        }
    }

    if let Value::Array(elements) = value
        && let Some(items) = rules.get("items")
        && !elements.iter().all(|element| conforms(element, items))
    {
        return false;
    }

    true
}

fn matches_type(value: &Value, name: &str) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}
