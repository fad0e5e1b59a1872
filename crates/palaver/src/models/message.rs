use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{Content, ToolUse};
use super::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: Vec<Content>,
    /// Set on the synthetic user message that asks the model to keep going after a truncated turn
    #[serde(default)]
    pub is_continuation: bool,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            content: Vec::new(),
            is_continuation: false,
        }
    }

    pub fn system() -> Self {
        Self::new(Role::System)
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// A user message flagged as a continuation request
    pub fn continuation<S: Into<String>>(text: S) -> Self {
        Message {
            is_continuation: true,
            ..Self::user()
        }
        .with_text(text)
    }

    /// Add any Content to the message
    pub fn with_content(mut self, content: Content) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(Content::text(text))
    }

    /// Add base64 image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, media_type: S, data: T) -> Self {
        self.with_content(Content::image(media_type, data))
    }

    /// Add a tool use to the message
    pub fn with_tool_use<S: Into<String>, N: Into<String>>(
        self,
        id: S,
        name: N,
        input: Value,
    ) -> Self {
        self.with_content(Content::tool_use(id, name, input))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<S: Into<String>>(self, id: S, contents: Vec<Content>) -> Self {
        self.with_content(Content::tool_result(id, contents))
    }

    /// Iterate over the tool uses in this message, in order
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(Content::as_tool_use)
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    /// The most recent text content, scanning backward
    pub fn last_text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(Content::as_text)
    }
}
