use serde_json::{json, Map, Value};

use super::base::{Decoded, Encoder, Provider};
use super::configs::AnthropicProviderConfig;
use super::utils::{check_tool_names, cost, get_u64, input_object, tool_parameters, tool_result_text};
use crate::errors::ProviderError;
use crate::models::content::Content;
use crate::models::message::Message;
use crate::models::request::{ReasoningConfig, Request};
use crate::models::response::{Response, StopReason};
use crate::models::role::Role;
use crate::transport::HttpRequest;

pub struct AnthropicProvider {
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Self {
        Self { config }
    }

    /// The single system message, if any, as the top level `system` field
    fn system_to_anthropic_spec(messages: &[Message]) -> Result<Option<Value>, ProviderError> {
        let mut system = None;
        for message in messages.iter().filter(|m| m.role == Role::System) {
            if system.is_some() {
                return Err(ProviderError::InvalidSystemMessage(
                    "Multiple system messages".to_string(),
                ));
            }
            if message.content.len() != 1 {
                return Err(ProviderError::InvalidSystemMessage(
                    "System message supports only one content block".to_string(),
                ));
            }
            system = match &message.content[0] {
                Content::Text(text) if text.cached => Some(json!([{
                    "type": "text",
                    "text": text.text,
                    "cache_control": {"type": "ephemeral"}
                }])),
                Content::Text(text) => Some(json!(text.text)),
                _ => {
                    return Err(ProviderError::InvalidSystemMessage(
                        "Unsupported system message type".to_string(),
                    ))
                }
            };
        }
        Ok(system)
    }

    fn content_to_anthropic_spec(content: &Content) -> Result<Value, ProviderError> {
        let mut block = match content {
            Content::Text(text) => json!({"type": "text", "text": text.text}),
            Content::ArrayData(data) => json!({"type": "text", "text": data.data.to_string()}),
            Content::Reasoning(reasoning) => {
                let mut block = json!({"type": "thinking", "thinking": reasoning.text});
                if let Some(signature) = &reasoning.signature {
                    block["signature"] = json!(signature);
                }
                block
            }
            Content::Image(image) => json!({
                "type": "image",
                "source": {
                    "type": image.encoding,
                    "media_type": image.media_type,
                    "data": image.data
                }
            }),
            Content::Pdf(pdf) => json!({
                "type": "document",
                "source": {
                    "type": pdf.encoding,
                    "media_type": "application/pdf",
                    "data": pdf.data
                }
            }),
            Content::ToolUse(tool_use) => json!({
                "type": "tool_use",
                "id": tool_use.id,
                "name": tool_use.name,
                "input": input_object(&tool_use.input)
            }),
            Content::ToolResult(result) => json!({
                "type": "tool_result",
                "tool_use_id": result.id,
                "content": tool_result_text(result, Self::content_to_anthropic_spec)?
            }),
        };

        if content.is_cached() {
            block["cache_control"] = json!({"type": "ephemeral"});
        }
        Ok(block)
    }

    fn messages_to_anthropic_spec(messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    _ => "assistant",
                };
                let content = message
                    .content
                    .iter()
                    .map(Self::content_to_anthropic_spec)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({"role": role, "content": content}))
            })
            .collect()
    }

    fn tools_to_anthropic_spec(request: &Request) -> Result<Vec<Value>, ProviderError> {
        check_tool_names(request)?;
        let family = request.model().family;
        Ok(request
            .tools()
            .iter()
            .map(|tool| match tool.native() {
                Some(native) => {
                    let spec = native.spec(family);
                    json!({"type": spec.tool_type, "name": spec.name})
                }
                None => json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool_parameters(tool.as_ref())
                }),
            })
            .collect())
    }

    fn response_to_message(data: &Value) -> Result<Message, ProviderError> {
        let blocks = data
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::MalformedResponse("missing content".to_string()))?;

        let mut message = Message::assistant();
        for block in blocks {
            let block_type = block.get("type").and_then(Value::as_str).unwrap_or_default();
            let content = match block_type {
                "text" => Content::text(str_field(block, "text")?),
                "thinking" => Content::reasoning(
                    str_field(block, "thinking")?,
                    block
                        .get("signature")
                        .and_then(Value::as_str)
                        .map(String::from),
                ),
                "tool_use" => Content::tool_use(
                    str_field(block, "id")?,
                    str_field(block, "name")?,
                    block.get("input").cloned().unwrap_or_else(|| json!({})),
                ),
                other => {
                    return Err(ProviderError::UnsupportedContent(format!(
                        "anthropic block \"{}\"",
                        other
                    )))
                }
            };
            message = message.with_content(content);
        }
        Ok(message)
    }

    /// `None` means the turn was paused and must be resent as is
    fn stop_reason(data: &Value) -> Result<Option<StopReason>, ProviderError> {
        match data.get("stop_reason").and_then(Value::as_str).unwrap_or_default() {
            "end_turn" | "stop_sequence" => Ok(Some(StopReason::Finished)),
            "max_tokens" => Ok(Some(StopReason::Length)),
            "tool_use" => Ok(Some(StopReason::ToolUse)),
            "refusal" => Ok(Some(StopReason::Safety)),
            "pause_turn" => Ok(None),
            other => Err(ProviderError::UnsupportedStopReason(other.to_string())),
        }
    }
}

fn str_field(block: &Value, key: &str) -> Result<String, ProviderError> {
    block
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("block without {}", key)))
}

impl Encoder for AnthropicProvider {
    fn encode(&self, request: &Request) -> Result<Value, ProviderError> {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model().code));
        payload.insert("max_tokens".to_string(), json!(request.max_tokens()));
        payload.insert(
            "messages".to_string(),
            json!(Self::messages_to_anthropic_spec(request.messages())?),
        );

        if let Some(system) = Self::system_to_anthropic_spec(request.messages())? {
            payload.insert("system".to_string(), system);
        }

        match request.reasoning() {
            Some(ReasoningConfig::Budget(budget_tokens)) => {
                // Extended thinking rejects any temperature override
                payload.insert(
                    "thinking".to_string(),
                    json!({"type": "enabled", "budget_tokens": budget_tokens}),
                );
            }
            Some(ReasoningConfig::Effort(effort)) => {
                return Err(ProviderError::UnsupportedReasoning(format!(
                    "anthropic takes a thinking budget, not effort \"{}\"",
                    effort
                )))
            }
            None => {
                payload.insert("temperature".to_string(), json!(request.temperature()));
            }
        }

        if !request.stop_sequences().is_empty() {
            payload.insert("stop_sequences".to_string(), json!(request.stop_sequences()));
        }

        let tools = Self::tools_to_anthropic_spec(request)?;
        if !tools.is_empty() {
            payload.insert("tools".to_string(), json!(tools));
            payload.insert("tool_choice".to_string(), json!({"type": "auto"}));
        }

        Ok(Value::Object(payload))
    }

    fn decode(&self, request: Request, reply: &Value) -> Result<Decoded, ProviderError> {
        let message = Self::response_to_message(reply)?;
        let stop_reason = Self::stop_reason(reply)?;

        let model = request.model();
        let input_tokens = get_u64(reply, "/usage/input_tokens");
        let output_tokens = get_u64(reply, "/usage/output_tokens");
        let cache_write = get_u64(reply, "/usage/cache_creation_input_tokens");
        let cache_read = get_u64(reply, "/usage/cache_read_input_tokens");
        let input_cost = cost(input_tokens, model.input_price_per_mtok)
            + cost(cache_write, model.cached_input_price_per_mtok);
        let output_cost = cost(output_tokens, model.output_price_per_mtok)
            + cost(cache_read, model.cached_output_price_per_mtok);

        let request = request
            .with_message(message)
            .with_cost(input_tokens, output_tokens, input_cost, output_cost);

        Ok(match stop_reason {
            Some(stop_reason) => Decoded::Response(Response::new(stop_reason, request)),
            None => Decoded::Request(request),
        })
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn http_request(&self, _request: &Request, body: &Value) -> HttpRequest {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));
        HttpRequest::post_json(url, body)
            .with_header("x-api-key", &self.config.api_key)
            .with_header("anthropic-version", &self.config.version)
    }
}
