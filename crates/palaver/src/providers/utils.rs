use serde_json::{json, Map, Value};

use crate::errors::ProviderError;
use crate::models::content::{Content, ToolResult, ToolResultContent};
use crate::models::request::Request;
use crate::tool::ToolDefinition;

/// USD for a token count at a price per million tokens
pub fn cost(tokens: u64, price_per_mtok: f64) -> f64 {
    tokens as f64 * price_per_mtok / 1_000_000.0
}

/// Flatten a tool result into the plain text most providers expect
///
/// Parts are concatenated as is. Content without a text form is encoded with the provider's
/// own block encoder and sent as JSON.
pub fn tool_result_text<F>(result: &ToolResult, encode: F) -> Result<String, ProviderError>
where
    F: Fn(&Content) -> Result<Value, ProviderError>,
{
    match &result.content {
        ToolResultContent::Raw(Value::String(text)) => Ok(text.clone()),
        ToolResultContent::Raw(value) => Ok(value.to_string()),
        ToolResultContent::Contents(contents) => {
            let mut text = String::new();
            for content in contents {
                match content {
                    Content::Text(part) => text.push_str(&part.text),
                    Content::ArrayData(data) => text.push_str(&data.data.to_string()),
                    other => {
                        let encoded = encode(other)?;
                        match encoded.get("text").and_then(Value::as_str) {
                            Some(part) => text.push_str(part),
                            None => text.push_str(&encoded.to_string()),
                        }
                    }
                }
            }
            Ok(text)
        }
    }
}

/// Human readable name of a content variant, for error messages
pub fn content_kind(content: &Content) -> &'static str {
    match content {
        Content::Text(_) => "text",
        Content::Image(_) => "image",
        Content::Pdf(_) => "pdf",
        Content::Reasoning(_) => "reasoning",
        Content::ToolUse(_) => "tool use",
        Content::ToolResult(_) => "tool result",
        Content::ArrayData(_) => "array data",
    }
}

/// Function names accepted by the function calling APIs: 1 to 64 of `[a-zA-Z0-9_-]`
pub fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A tool schema with a guaranteed `properties` object, which providers reject when missing
pub fn tool_parameters(tool: &dyn ToolDefinition) -> Value {
    let mut schema = match tool.input_schema() {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    schema
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    match schema.get("properties") {
        Some(Value::Object(_)) => {}
        _ => {
            schema.insert("properties".to_string(), json!({}));
        }
    }
    Value::Object(schema)
}

/// Check tool names before they go out, so a bad name fails here instead of at the API
pub fn check_tool_names(request: &Request) -> Result<(), ProviderError> {
    let mut seen = std::collections::HashSet::new();
    for tool in request.tools() {
        if tool.native().is_none() && !is_valid_function_name(tool.name()) {
            return Err(ProviderError::InvalidToolName(tool.name().to_string()));
        }
        if !seen.insert(tool.name()) {
            return Err(ProviderError::InvalidToolName(format!(
                "{} is defined more than once",
                tool.name()
            )));
        }
    }
    Ok(())
}

/// An input object, with an empty object standing in for a missing or null one
pub fn input_object(input: &Value) -> Value {
    match input {
        Value::Object(_) => input.clone(),
        Value::Array(items) if items.is_empty() => json!({}),
        Value::Null => json!({}),
        other => other.clone(),
    }
}

pub fn get_u64(value: &Value, pointer: &str) -> u64 {
    value.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FunctionTool;

    #[test]
    fn test_cost() {
        assert_eq!(cost(1_000_000, 3.0), 3.0);
        assert!((cost(1234, 15.0) - 0.01851).abs() < 1e-12);
        assert_eq!(cost(0, 15.0), 0.0);
    }

    fn image_block(content: &Content) -> Result<Value, ProviderError> {
        match content {
            Content::Image(image) => Ok(json!({"type": "image", "data": image.data})),
            other => Err(ProviderError::UnsupportedContent(content_kind(other).to_string())),
        }
    }

    #[test]
    fn test_tool_result_text() {
        let result = ToolResult {
            id: "1".to_string(),
            content: ToolResultContent::Contents(vec![
                Content::text("line one"),
                Content::array_data(json!({"n": 2})),
            ]),
            cached: false,
        };
        assert_eq!(tool_result_text(&result, image_block).unwrap(), "line one{\"n\":2}");

        let raw = ToolResult {
            id: "1".to_string(),
            content: ToolResultContent::Raw(json!("plain")),
            cached: false,
        };
        assert_eq!(tool_result_text(&raw, image_block).unwrap(), "plain");
    }

    #[test]
    fn test_tool_result_text_encodes_other_content() {
        let result = ToolResult {
            id: "1".to_string(),
            content: ToolResultContent::Contents(vec![
                Content::text("see: "),
                Content::image("image/png", "AAAA"),
            ]),
            cached: false,
        };
        let text = tool_result_text(&result, image_block).unwrap();
        let encoded: Value = serde_json::from_str(text.strip_prefix("see: ").unwrap()).unwrap();
        assert_eq!(encoded, json!({"type": "image", "data": "AAAA"}));

        let pdf = ToolResult {
            id: "1".to_string(),
            content: ToolResultContent::Contents(vec![Content::pdf("JVBE")]),
            cached: false,
        };
        assert!(matches!(
            tool_result_text(&pdf, image_block),
            Err(ProviderError::UnsupportedContent(_))
        ));
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("get_weather-2"));
        assert!(!is_valid_function_name("get weather"));
        assert!(!is_valid_function_name(""));
        assert!(!is_valid_function_name(&"a".repeat(65)));
    }

    #[test]
    fn test_tool_parameters_fills_properties() {
        let tool = FunctionTool::new("noop", "Does nothing", json!({"type": "object"}), |_| async {
            Ok(vec![])
        });
        assert_eq!(tool_parameters(&tool), json!({"type": "object", "properties": {}}));
    }
}
