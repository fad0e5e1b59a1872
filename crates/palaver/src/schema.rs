//! Validation of tool input against the JSON schema a tool declares

use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;

/// One reason an instance does not match its schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    /// JSON pointer to the offending value, empty for the root
    pub pointer: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.pointer, self.message)
        }
    }
}

/// Join issues into the single line sent back to the model
pub fn describe(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tools without required properties accept an empty input without checking it
pub fn should_validate(schema: &Value, input: &Value) -> bool {
    let empty = match input {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    let has_required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|required| !required.is_empty())
        .unwrap_or(false);
    !empty || has_required
}

/// Check an instance against a full JSON schema, collecting every violation
///
/// A schema that does not compile is reported as a single issue at the root.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), Vec<SchemaIssue>> {
    let compiled = JSONSchema::compile(schema).map_err(|error| {
        vec![SchemaIssue {
            pointer: String::new(),
            message: format!("invalid schema: {}", error),
        }]
    })?;

    let issues: Vec<SchemaIssue> = match compiled.validate(instance) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|error| SchemaIssue {
                pointer: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect(),
    };
    Err(issues)
}
