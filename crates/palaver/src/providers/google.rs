use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::base::{Decoded, Encoder, Provider};
use super::configs::GoogleProviderConfig;
use super::utils::{check_tool_names, cost, get_u64, input_object, tool_parameters, tool_result_text};
use crate::errors::ProviderError;
use crate::models::content::Content;
use crate::models::message::Message;
use crate::models::request::{ReasoningConfig, ReasoningEffort, Request};
use crate::models::response::{Response, StopReason};
use crate::models::role::Role;
use crate::transport::HttpRequest;

/// Gemini through the generative language API
pub struct GoogleProvider {
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> Self {
        Self { config }
    }

    fn system_instruction(messages: &[Message]) -> Result<Option<Value>, ProviderError> {
        let mut texts = Vec::new();
        for message in messages.iter().filter(|m| m.role == Role::System) {
            for content in &message.content {
                match content {
                    Content::Text(text) => texts.push(text.text.as_str()),
                    _ => {
                        return Err(ProviderError::InvalidSystemMessage(
                            "Unsupported system message type".to_string(),
                        ))
                    }
                }
            }
        }
        if texts.is_empty() {
            return Ok(None);
        }
        Ok(Some(json!({"parts": [{"text": texts.join("\n")}]})))
    }

    fn content_to_part(content: &Content) -> Result<Value, ProviderError> {
        match content {
            Content::Text(text) => Ok(json!({"text": text.text})),
            Content::ArrayData(data) => Ok(json!({"text": data.data.to_string()})),
            Content::Image(image) => Ok(json!({
                "inlineData": {"mimeType": image.media_type, "data": image.data}
            })),
            Content::Pdf(_) => Err(ProviderError::PdfNotSupported("Gemini".to_string())),
            Content::Reasoning(reasoning) => {
                let mut part = json!({"text": reasoning.text, "thought": true});
                if let Some(signature) = &reasoning.signature {
                    part["thoughtSignature"] = json!(signature);
                }
                Ok(part)
            }
            Content::ToolUse(tool_use) => Ok(json!({
                "functionCall": {"name": tool_use.name, "args": input_object(&tool_use.input)}
            })),
            Content::ToolResult(_) => Err(ProviderError::UnsupportedContent(
                "tool result outside of a user message".to_string(),
            )),
        }
    }

    /// Gemini has no tool role and no call ids, so results go into a synthesized `function`
    /// turn and are matched to their call by name
    fn messages_to_google_spec(messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        let mut contents = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            let role = match message.role {
                Role::System => continue,
                Role::User => "user",
                Role::Assistant => "model",
            };

            let mut parts = Vec::new();
            let mut responses = Vec::new();
            for content in &message.content {
                match content {
                    Content::ToolResult(result) if message.role == Role::User => {
                        let name = messages[..index]
                            .iter()
                            .rev()
                            .flat_map(|message| message.tool_uses())
                            .find(|tool_use| tool_use.id == result.id)
                            .map(|tool_use| tool_use.name.clone())
                            .ok_or_else(|| {
                                ProviderError::UnsupportedContent(format!(
                                    "tool result {} has no matching tool use",
                                    result.id
                                ))
                            })?;
                        responses.push(json!({
                            "functionResponse": {
                                "name": name,
                                "response": {"content": tool_result_text(result, Self::content_to_part)?}
                            }
                        }));
                    }
                    other => parts.push(Self::content_to_part(other)?),
                }
            }

            if !responses.is_empty() {
                contents.push(json!({"role": "function", "parts": responses}));
            }
            if !parts.is_empty() {
                contents.push(json!({"role": role, "parts": parts}));
            }
        }
        Ok(contents)
    }

    fn thinking_config(request: &Request) -> Result<Option<Value>, ProviderError> {
        match request.reasoning() {
            None => Ok(None),
            Some(ReasoningConfig::Budget(tokens)) => Ok(Some(json!({"thinkingBudget": tokens}))),
            Some(ReasoningConfig::Effort(ReasoningEffort::Low)) => {
                Ok(Some(json!({"thinkingLevel": "low"})))
            }
            Some(ReasoningConfig::Effort(ReasoningEffort::High)) => {
                Ok(Some(json!({"thinkingLevel": "high"})))
            }
            Some(ReasoningConfig::Effort(effort)) => Err(ProviderError::UnsupportedReasoning(
                format!("gemini has no \"{}\" thinking level", effort),
            )),
        }
    }

    fn response_to_message(candidate: &Value) -> Result<Message, ProviderError> {
        let mut message = Message::assistant();
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for part in parts {
            let content = if let Some(text) = part.get("text").and_then(Value::as_str) {
                if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                    Content::reasoning(
                        text,
                        part.get("thoughtSignature")
                            .and_then(Value::as_str)
                            .map(String::from),
                    )
                } else {
                    Content::text(text)
                }
            } else if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::MalformedResponse("functionCall without name".to_string())
                    })?;
                let id = format!("call_{}", Uuid::new_v4().simple());
                Content::tool_use(id, name, call.get("args").cloned().unwrap_or_else(|| json!({})))
            } else if let Some(data) = part.get("inlineData") {
                let mime_type = data["mimeType"].as_str().unwrap_or_default();
                let payload = data["data"].as_str().unwrap_or_default();
                match mime_type {
                    "application/pdf" => {
                        return Err(ProviderError::PdfNotSupported("Gemini".to_string()))
                    }
                    image if image.starts_with("image/") => Content::image(image, payload),
                    other => {
                        return Err(ProviderError::UnsupportedContent(format!(
                            "gemini inline data \"{}\"",
                            other
                        )))
                    }
                }
            } else {
                return Err(ProviderError::UnsupportedContent(format!(
                    "gemini part {}",
                    part
                )));
            };
            message = message.with_content(content);
        }
        Ok(message)
    }

    fn stop_reason(candidate: &Value, message: &Message) -> Result<StopReason, ProviderError> {
        let reason = match candidate.get("finishReason").and_then(Value::as_str) {
            None | Some("STOP") | Some("FINISH_REASON_UNSPECIFIED") => StopReason::Finished,
            Some("MAX_TOKENS") => StopReason::Length,
            Some("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII")
            | Some("IMAGE_SAFETY") => StopReason::Safety,
            Some("FUNCTION_CALL") => StopReason::ToolUse,
            Some(other) => return Err(ProviderError::UnsupportedStopReason(other.to_string())),
        };
        if message.has_tool_use() {
            return Ok(StopReason::ToolUse);
        }
        Ok(reason)
    }
}

impl Encoder for GoogleProvider {
    fn encode(&self, request: &Request) -> Result<Value, ProviderError> {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            json!(Self::messages_to_google_spec(request.messages())?),
        );
        if let Some(system) = Self::system_instruction(request.messages())? {
            payload.insert("systemInstruction".to_string(), system);
        }

        let mut generation = json!({
            "temperature": request.temperature(),
            "maxOutputTokens": request.max_tokens()
        });
        if !request.stop_sequences().is_empty() {
            generation["stopSequences"] = json!(request.stop_sequences());
        }
        if let Some(thinking) = Self::thinking_config(request)? {
            generation["thinkingConfig"] = thinking;
        }
        payload.insert("generationConfig".to_string(), generation);

        check_tool_names(request)?;
        if !request.tools().is_empty() {
            let declarations: Vec<Value> = request
                .tools()
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool_parameters(tool.as_ref())
                    })
                })
                .collect();
            payload.insert(
                "tools".to_string(),
                json!([{"functionDeclarations": declarations}]),
            );
        }

        Ok(Value::Object(payload))
    }

    fn decode(&self, request: Request, reply: &Value) -> Result<Decoded, ProviderError> {
        let (message, stop_reason) = match reply.pointer("/candidates/0") {
            Some(candidate) => {
                let message = Self::response_to_message(candidate)?;
                let stop_reason = Self::stop_reason(candidate, &message)?;
                (message, stop_reason)
            }
            // A blocked prompt comes back without candidates
            None if reply.pointer("/promptFeedback/blockReason").is_some() => {
                (Message::assistant(), StopReason::Safety)
            }
            None => {
                return Err(ProviderError::MalformedResponse(
                    "no candidates".to_string(),
                ))
            }
        };

        let model = request.model();
        let input_tokens = get_u64(reply, "/usageMetadata/promptTokenCount");
        let output_tokens = get_u64(reply, "/usageMetadata/candidatesTokenCount")
            + get_u64(reply, "/usageMetadata/thoughtsTokenCount");
        let cached_tokens =
            get_u64(reply, "/usageMetadata/cachedContentTokenCount").min(input_tokens);
        let input_cost = cost(input_tokens - cached_tokens, model.input_price_per_mtok)
            + cost(cached_tokens, model.cached_input_price_per_mtok);
        let output_cost = cost(output_tokens, model.output_price_per_mtok);

        let request = request
            .with_message(message)
            .with_cost(input_tokens, output_tokens, input_cost, output_cost);
        Ok(Decoded::Response(Response::new(stop_reason, request)))
    }
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn http_request(&self, request: &Request, body: &Value) -> HttpRequest {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            request.model().code
        );
        HttpRequest::post_json(url, body).with_header("x-goog-api-key", &self.config.api_key)
    }
}
