use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::models::content::Content;
use crate::models::model::ModelFamily;

/// Well known tools some providers ship their own schema for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTool {
    TextEditor,
}

/// The provider specific type and name of a native tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSpec {
    pub tool_type: &'static str,
    pub name: &'static str,
}

const TEXT_EDITOR_VERSIONS: &[(ModelFamily, NativeSpec)] = &[
    (
        ModelFamily::Claude4,
        NativeSpec {
            tool_type: "text_editor_20250728",
            name: "str_replace_based_edit_tool",
        },
    ),
    (
        ModelFamily::Claude37,
        NativeSpec {
            tool_type: "text_editor_20250124",
            name: "str_replace_editor",
        },
    ),
];

const TEXT_EDITOR_FALLBACK: NativeSpec = NativeSpec {
    tool_type: "text_editor_20250429",
    name: "str_replace_based_edit_tool",
};

impl NativeTool {
    pub fn spec(self, family: ModelFamily) -> NativeSpec {
        match self {
            NativeTool::TextEditor => TEXT_EDITOR_VERSIONS
                .iter()
                .find(|(f, _)| *f == family)
                .map(|(_, spec)| *spec)
                .unwrap_or(TEXT_EDITOR_FALLBACK),
        }
    }
}

/// A tool that can be offered to a model and executed when the model asks for it
#[async_trait]
pub trait ToolDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object
    fn input_schema(&self) -> &Value;

    fn native(&self) -> Option<NativeTool> {
        None
    }

    /// Run the tool. An `Err` aborts the agent run; errors the model should see belong in the
    /// returned content.
    async fn handle(&self, input: Value) -> Result<Vec<Content>>;
}

/// The name a model of the given family uses when calling this tool
pub fn wire_name(tool: &dyn ToolDefinition, family: ModelFamily) -> &str {
    match tool.native() {
        Some(native) => native.spec(family).name,
        None => tool.name(),
    }
}

/// Find the tool a model called by name
pub fn find_tool<'a>(
    tools: &'a [Arc<dyn ToolDefinition>],
    name: &str,
    family: ModelFamily,
) -> Option<&'a Arc<dyn ToolDefinition>> {
    tools
        .iter()
        .find(|tool| tool.name() == name || wire_name(tool.as_ref(), family) == name)
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Vec<Content>>> + Send + Sync>;

/// A tool backed by an async closure
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<N, D, F, Fut>(name: N, description: D, input_schema: Value, handler: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |input| Box::pin(handler(input))),
        }
    }
}

#[async_trait]
impl ToolDefinition for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn handle(&self, input: Value) -> Result<Vec<Content>> {
        (self.handler)(input).await
    }
}
