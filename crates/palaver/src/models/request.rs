use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

use super::conversation::Conversation;
use super::message::Message;
use super::model::ModelInfo;
use super::response::Response;
use crate::tool::ToolDefinition;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Called when a turn ends without pending tools. Returning a message resends with it appended.
pub type FeedbackCallback = Arc<dyn Fn(&Response) -> anyhow::Result<Option<Message>> + Send + Sync>;

/// Called when a turn is truncated. Returns the request to send next, or a request ending in an
/// assistant message to stop.
pub type ContinuationCallback = Arc<dyn Fn(&Response) -> anyhow::Result<Request> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    ExtraHigh,
}

/// How much thinking a model may do. Each provider supports only some of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningConfig {
    /// Maximum number of thinking tokens
    Budget(u32),
    Effort(ReasoningEffort),
}

/// Cumulative token, cost and time counters for a whole exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Largest output of any single turn
    pub max_output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub time_ms: u64,
}

impl Usage {
    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

/// Everything needed to ask a model for its next turn, plus the running totals so far
#[derive(Clone)]
pub struct Request {
    model: ModelInfo,
    conversation: Conversation,
    temperature: f32,
    max_tokens: u32,
    tools: Vec<Arc<dyn ToolDefinition>>,
    stop_sequences: Vec<String>,
    reasoning: Option<ReasoningConfig>,
    feedback: Option<FeedbackCallback>,
    continuation: Option<ContinuationCallback>,
    usage: Usage,
}

impl Request {
    pub fn new(model: ModelInfo, conversation: Conversation) -> Self {
        Self {
            model,
            conversation,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: Vec::new(),
            stop_sequences: Vec::new(),
            reasoning: None,
            feedback: None,
            continuation: None,
            usage: Usage::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolDefinition>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn ToolDefinition>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_stop_sequences<S: Into<String>>(mut self, stop: impl IntoIterator<Item = S>) -> Self {
        self.stop_sequences = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_feedback<F>(mut self, feedback: F) -> Self
    where
        F: Fn(&Response) -> anyhow::Result<Option<Message>> + Send + Sync + 'static,
    {
        self.feedback = Some(Arc::new(feedback));
        self
    }

    pub fn with_continuation<F>(mut self, continuation: F) -> Self
    where
        F: Fn(&Response) -> anyhow::Result<Request> + Send + Sync + 'static,
    {
        self.continuation = Some(Arc::new(continuation));
        self
    }

    pub fn without_feedback(mut self) -> Self {
        self.feedback = None;
        self
    }

    /// A copy of this request with one more message in its conversation
    pub fn with_message(&self, message: Message) -> Self {
        Self {
            conversation: self.conversation.with_message(message),
            ..self.clone()
        }
    }

    pub fn with_conversation(&self, conversation: Conversation) -> Self {
        Self {
            conversation,
            ..self.clone()
        }
    }

    /// A copy of this request with one turn's tokens and cost added to the totals
    pub fn with_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        input_cost: f64,
        output_cost: f64,
    ) -> Self {
        let usage = self.usage;
        Self {
            usage: Usage {
                input_tokens: usage.input_tokens + input_tokens,
                output_tokens: usage.output_tokens + output_tokens,
                max_output_tokens: usage.max_output_tokens.max(output_tokens),
                input_cost: usage.input_cost + input_cost,
                output_cost: usage.output_cost + output_cost,
                ..usage
            },
            ..self.clone()
        }
    }

    /// A copy of this request with elapsed wall time added to the total
    pub fn with_time(&self, time_ms: u64) -> Self {
        let mut usage = self.usage;
        usage.time_ms += time_ms;
        Self {
            usage,
            ..self.clone()
        }
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn tools(&self) -> &[Arc<dyn ToolDefinition>] {
        &self.tools
    }

    pub fn stop_sequences(&self) -> &[String] {
        &self.stop_sequences
    }

    pub fn reasoning(&self) -> Option<ReasoningConfig> {
        self.reasoning
    }

    pub fn feedback(&self) -> Option<&FeedbackCallback> {
        self.feedback.as_ref()
    }

    pub fn continuation(&self) -> Option<&ContinuationCallback> {
        self.continuation.as_ref()
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("Request")
            .field("model", &self.model.code)
            .field("conversation", &self.conversation)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("tools", &tools)
            .field("stop_sequences", &self.stop_sequences)
            .field("reasoning", &self.reasoning)
            .field("feedback", &self.feedback.is_some())
            .field("continuation", &self.continuation.is_some())
            .field("usage", &self.usage)
            .finish()
    }
}
