use serde_json::{json, Map, Value};

use super::base::{Decoded, Encoder, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{check_tool_names, cost, get_u64, tool_parameters, tool_result_text};
use crate::errors::ProviderError;
use crate::models::content::Content;
use crate::models::message::Message;
use crate::models::request::{ReasoningConfig, Request};
use crate::models::response::{Response, StopReason};
use crate::models::role::Role;
use crate::transport::HttpRequest;

pub struct OpenAiProvider {
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Self {
        Self { config }
    }

    fn content_to_openai_spec(content: &Content) -> Result<Value, ProviderError> {
        match content {
            Content::Text(text) => Ok(json!({"type": "text", "text": text.text})),
            Content::ArrayData(data) => Ok(json!({"type": "text", "text": data.data.to_string()})),
            Content::Image(image) => Ok(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};{},{}", image.media_type, image.encoding, image.data)
                }
            })),
            Content::Pdf(pdf) => Ok(json!({
                "type": "file",
                "file": {
                    "file_data": format!("data:application/pdf;{},{}", pdf.encoding, pdf.data),
                    "filename": "file.pdf"
                }
            })),
            Content::Reasoning(_) => Err(ProviderError::UnsupportedContent(
                "reasoning is not accepted by openai".to_string(),
            )),
            Content::ToolUse(_) | Content::ToolResult(_) => Err(ProviderError::UnsupportedContent(
                "tool content outside of a tool message".to_string(),
            )),
        }
    }

    /// Convert internal messages to the chat completions format
    ///
    /// Tool uses move to their own assistant message with a `tool_calls` list, and each tool
    /// result becomes a `tool` message placed before any other content of its user turn.
    fn messages_to_openai_spec(messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        let mut messages_spec = Vec::new();
        for message in messages {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };

            let mut blocks = Vec::new();
            let mut tool_calls = Vec::new();
            for content in &message.content {
                match content {
                    Content::ToolUse(tool_use) if message.role == Role::Assistant => {
                        tool_calls.push(json!({
                            "id": tool_use.id,
                            "type": "function",
                            "function": {
                                "name": tool_use.name,
                                "arguments": tool_use.input.to_string()
                            }
                        }));
                    }
                    Content::ToolResult(result) if message.role == Role::User => {
                        messages_spec.push(json!({
                            "role": "tool",
                            "content": tool_result_text(result, Self::content_to_openai_spec)?,
                            "tool_call_id": result.id
                        }));
                    }
                    other => blocks.push(Self::content_to_openai_spec(other)?),
                }
            }

            if !blocks.is_empty() {
                messages_spec.push(json!({"role": role, "content": blocks}));
            }
            if !tool_calls.is_empty() {
                messages_spec.push(json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": tool_calls
                }));
            }
        }
        Ok(messages_spec)
    }

    fn tools_to_openai_spec(request: &Request) -> Result<Vec<Value>, ProviderError> {
        check_tool_names(request)?;
        Ok(request
            .tools()
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool_parameters(tool.as_ref())
                    }
                })
            })
            .collect())
    }

    fn response_to_message(choice: &Value) -> Result<Message, ProviderError> {
        let original = &choice["message"];
        let mut message = Message::assistant();

        if let Some(text) = original.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                message = message.with_text(text);
            }
        }

        if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
            for tool_call in tool_calls {
                let id = tool_call["id"].as_str().unwrap_or_default();
                let name = tool_call["function"]["name"].as_str().unwrap_or_default();
                let arguments = tool_call["function"]["arguments"]
                    .as_str()
                    .unwrap_or_default();
                let input = match arguments {
                    "" => json!({}),
                    raw => serde_json::from_str(raw).map_err(|e| {
                        ProviderError::MalformedResponse(format!(
                            "arguments of tool call {} are not valid JSON: {}",
                            id, e
                        ))
                    })?,
                };
                message = message.with_tool_use(id, name, input);
            }
        }

        Ok(message)
    }

    fn stop_reason(choice: &Value) -> Result<StopReason, ProviderError> {
        match choice["finish_reason"].as_str().unwrap_or_default() {
            "stop" => Ok(StopReason::Finished),
            "length" => Ok(StopReason::Length),
            "tool_calls" => Ok(StopReason::ToolUse),
            "content_filter" => Ok(StopReason::Safety),
            other => Err(ProviderError::UnsupportedStopReason(other.to_string())),
        }
    }
}

impl Encoder for OpenAiProvider {
    fn encode(&self, request: &Request) -> Result<Value, ProviderError> {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model().code));
        payload.insert(
            "messages".to_string(),
            json!(Self::messages_to_openai_spec(request.messages())?),
        );
        payload.insert(
            "max_completion_tokens".to_string(),
            json!(request.max_tokens()),
        );

        match request.reasoning() {
            Some(ReasoningConfig::Effort(effort)) => {
                // Reasoning models only accept the default temperature
                payload.insert("reasoning_effort".to_string(), json!(effort.to_string()));
            }
            Some(ReasoningConfig::Budget(tokens)) => {
                return Err(ProviderError::UnsupportedReasoning(format!(
                    "openai takes a reasoning effort, not a budget of {} tokens",
                    tokens
                )))
            }
            None => {
                payload.insert("temperature".to_string(), json!(request.temperature()));
            }
        }

        if !request.stop_sequences().is_empty() {
            payload.insert("stop".to_string(), json!(request.stop_sequences()));
        }

        let tools = Self::tools_to_openai_spec(request)?;
        if !tools.is_empty() {
            payload.insert("tools".to_string(), json!(tools));
        }

        Ok(Value::Object(payload))
    }

    fn decode(&self, request: Request, reply: &Value) -> Result<Decoded, ProviderError> {
        if let Some(error) = reply.get("error") {
            return Err(ProviderError::MalformedResponse(format!(
                "OpenAI API error: {}",
                error
            )));
        }

        let choice = reply
            .pointer("/choices/0")
            .ok_or_else(|| ProviderError::MalformedResponse("no choices".to_string()))?;
        let stop_reason = Self::stop_reason(choice)?;
        let message = Self::response_to_message(choice)?;

        let model = request.model();
        let input_tokens = get_u64(reply, "/usage/prompt_tokens");
        let output_tokens = get_u64(reply, "/usage/completion_tokens");
        let cached_tokens =
            get_u64(reply, "/usage/prompt_tokens_details/cached_tokens").min(input_tokens);
        let input_cost = cost(input_tokens - cached_tokens, model.input_price_per_mtok)
            + cost(cached_tokens, model.cached_input_price_per_mtok);
        let output_cost = cost(output_tokens, model.output_price_per_mtok);

        let request = request
            .with_message(message)
            .with_cost(input_tokens, output_tokens, input_cost, output_cost);
        Ok(Decoded::Response(Response::new(stop_reason, request)))
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn http_request(&self, _request: &Request, body: &Value) -> HttpRequest {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        HttpRequest::post_json(url, body)
            .with_header("Authorization", format!("Bearer {}", self.config.api_key))
    }
}
