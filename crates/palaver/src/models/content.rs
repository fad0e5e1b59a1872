use serde::{Deserialize, Serialize};
use serde_json::Value;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Transfer encoding of `data`, in practice always `base64`
    pub encoding: String,
    pub media_type: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfContent {
    pub encoding: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

/// An opaque thinking trace. The signature must be sent back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningContent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

/// The payload of a tool result: either content produced by a handler, or a raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Contents(Vec<Content>),
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Id of the tool use this result answers
    pub id: String,
    pub content: ToolResultContent,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayDataContent {
    pub data: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Content passed to or from an LLM
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
    Pdf(PdfContent),
    Reasoning(ReasoningContent),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    ArrayData(ArrayDataContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent {
            text: text.into(),
            cached: false,
        })
    }

    /// Base64 image content
    pub fn image<S: Into<String>, T: Into<String>>(media_type: S, data: T) -> Self {
        Content::Image(ImageContent {
            encoding: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
            cached: false,
        })
    }

    /// Base64 pdf content
    pub fn pdf<S: Into<String>>(data: S) -> Self {
        Content::Pdf(PdfContent {
            encoding: "base64".to_string(),
            data: data.into(),
            cached: false,
        })
    }

    pub fn reasoning<S: Into<String>>(text: S, signature: Option<String>) -> Self {
        Content::Reasoning(ReasoningContent {
            text: text.into(),
            signature,
            cached: false,
        })
    }

    pub fn tool_use<S: Into<String>, N: Into<String>>(id: S, name: N, input: Value) -> Self {
        Content::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
            cached: false,
        })
    }

    pub fn tool_result<S: Into<String>>(id: S, contents: Vec<Content>) -> Self {
        Content::ToolResult(ToolResult {
            id: id.into(),
            content: ToolResultContent::Contents(contents),
            cached: false,
        })
    }

    pub fn tool_result_raw<S: Into<String>>(id: S, value: Value) -> Self {
        Content::ToolResult(ToolResult {
            id: id.into(),
            content: ToolResultContent::Raw(value),
            cached: false,
        })
    }

    pub fn array_data(data: Value) -> Self {
        Content::ArrayData(ArrayDataContent {
            data,
            cached: false,
        })
    }

    /// Mark this content as a prompt cache breakpoint
    pub fn with_cache(mut self) -> Self {
        match &mut self {
            Content::Text(c) => c.cached = true,
            Content::Image(c) => c.cached = true,
            Content::Pdf(c) => c.cached = true,
            Content::Reasoning(c) => c.cached = true,
            Content::ToolUse(c) => c.cached = true,
            Content::ToolResult(c) => c.cached = true,
            Content::ArrayData(c) => c.cached = true,
        }
        self
    }

    pub fn is_cached(&self) -> bool {
        match self {
            Content::Text(c) => c.cached,
            Content::Image(c) => c.cached,
            Content::Pdf(c) => c.cached,
            Content::Reasoning(c) => c.cached,
            Content::ToolUse(c) => c.cached,
            Content::ToolResult(c) => c.cached,
            Content::ArrayData(c) => c.cached,
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            Content::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Content::ToolResult(tool_result) => Some(tool_result),
            _ => None,
        }
    }
}
