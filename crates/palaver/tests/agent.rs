use anyhow::{anyhow, Result};
use async_trait::async_trait;
use palaver::{
    agent::Agent,
    continuation::tag_continuation,
    models::{
        content::{Content, ToolResultContent},
        conversation::Conversation,
        message::Message,
        model::ModelInfo,
        request::Request,
        response::StopReason,
        role::Role,
    },
    providers::{
        anthropic::AnthropicProvider,
        base::ProviderClient,
        configs::{AnthropicProviderConfig, OpenAiProviderConfig},
        openai::OpenAiProvider,
    },
    storage::{memory::MemoryStorage, Storage},
    text_editor::TextEditorTool,
    tool::{FunctionTool, ToolDefinition},
    transport::{HttpRequest, HttpResponse, Transport},
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned provider replies in order and records what was sent
#[derive(Clone, Default)]
struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Value>>>,
    sent: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            sent: Arc::default(),
        }
    }

    fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.sent
            .lock()
            .unwrap()
            .push(serde_json::from_str(&request.body)?);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))?;
        Ok(HttpResponse::new(200, reply.to_string()))
    }
}

fn anthropic_agent(
    replies: Vec<Value>,
) -> (
    Agent<ProviderClient<AnthropicProvider, ScriptedTransport>>,
    ScriptedTransport,
) {
    let transport = ScriptedTransport::new(replies);
    let provider = AnthropicProvider::new(AnthropicProviderConfig::new("test_api_key"));
    (
        Agent::new(ProviderClient::new(provider, transport.clone())),
        transport,
    )
}

fn anthropic_reply(content: Value, stop_reason: &str, input: u64, output: u64) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": input, "output_tokens": output}
    })
}

fn weather_tool() -> Arc<dyn ToolDefinition> {
    Arc::new(FunctionTool::new(
        "get_weather",
        "Get the weather for a location",
        json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {"type": "string"}
            }
        }),
        |input: Value| async move {
            let location = input["location"].as_str().unwrap_or_default().to_string();
            Ok(vec![Content::text(format!("Sunny in {}", location))])
        },
    ))
}

fn result_text(message: &Message) -> String {
    match &message.content[0].as_tool_result().unwrap().content {
        ToolResultContent::Contents(contents) => contents[0].as_text().unwrap().to_string(),
        ToolResultContent::Raw(value) => value.to_string(),
    }
}

fn user_request(text: &str) -> Request {
    Request::new(
        ModelInfo::claude_sonnet_4_5(),
        Conversation::new().with_message(Message::user().with_text(text)),
    )
}

#[tokio::test]
async fn test_two_hop_tool_exchange() -> Result<()> {
    let (agent, transport) = anthropic_agent(vec![
        anthropic_reply(
            json!([
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Prague"}}
            ]),
            "tool_use",
            100,
            50,
        ),
        anthropic_reply(
            json!([{"type": "text", "text": "It is sunny in Prague."}]),
            "end_turn",
            200,
            20,
        ),
    ]);

    let request = user_request("Weather in Prague?").with_tool(weather_tool());
    let response = agent.run(request).await?;

    assert_eq!(response.stop_reason(), StopReason::Finished);
    assert_eq!(response.last_text()?, "It is sunny in Prague.");

    // user, assistant tool use, user tool result, assistant answer
    let messages = response.conversation().messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(result_text(&messages[2]), "Sunny in Prague");

    let model = ModelInfo::claude_sonnet_4_5();
    let first = (100.0 * model.input_price_per_mtok + 50.0 * model.output_price_per_mtok) / 1e6;
    let second = (200.0 * model.input_price_per_mtok + 20.0 * model.output_price_per_mtok) / 1e6;
    let usage = response.usage();
    assert_eq!(usage.input_tokens, 300);
    assert_eq!(usage.output_tokens, 70);
    assert_eq!(usage.max_output_tokens, 50);
    assert!((usage.total_cost() - (first + second)).abs() < 1e-12);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1]["messages"][2]["content"][0]["type"], "tool_result");
    assert_eq!(sent[1]["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
    Ok(())
}

#[tokio::test]
async fn test_schema_invalid_input_keeps_loop_alive() -> Result<()> {
    let (agent, _) = anthropic_agent(vec![
        anthropic_reply(
            json!([{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Prague"}}]),
            "tool_use",
            10,
            10,
        ),
        anthropic_reply(
            json!([{"type": "text", "text": "Retrying is pointless."}]),
            "end_turn",
            10,
            10,
        ),
    ]);

    let response = agent
        .run(user_request("Weather?").with_tool(weather_tool()))
        .await?;
    let messages = response.conversation().messages();
    assert!(result_text(&messages[2]).starts_with("ERROR: Input is not matching expected schema"));
    assert_eq!(response.stop_reason(), StopReason::Finished);
    Ok(())
}

#[tokio::test]
async fn test_pause_turn_is_resent() -> Result<()> {
    let (agent, transport) = anthropic_agent(vec![
        anthropic_reply(json!([{"type": "text", "text": "Searching"}]), "pause_turn", 5, 5),
        anthropic_reply(json!([{"type": "text", "text": "Found it"}]), "end_turn", 5, 5),
    ]);

    let response = agent.run(user_request("Find it")).await?;
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(response.last_text()?, "Found it");
    assert_eq!(response.usage().output_tokens, 10);
    Ok(())
}

#[tokio::test]
async fn test_truncated_tag_is_trimmed_and_continued() -> Result<()> {
    let (agent, transport) = anthropic_agent(vec![
        anthropic_reply(
            json!([{"type": "text", "text": "<outputFoo>done</outputFoo>\n<outputFoo>half"}]),
            "max_tokens",
            10,
            100,
        ),
        anthropic_reply(
            json!([{"type": "text", "text": "\n<outputFoo>whole</outputFoo>"}]),
            "end_turn",
            10,
            10,
        ),
    ]);

    let request = user_request("Write two blocks")
        .with_continuation(tag_continuation(["outputFoo"]));
    let response = agent.run(request).await?;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let resent = &sent[1]["messages"];
    assert_eq!(resent[1]["content"][0]["text"], "<outputFoo>done</outputFoo>");
    assert_eq!(resent[2]["content"][0]["text"], "Continue");

    let merged = palaver::continuation::merge_continuations(response.conversation());
    assert_eq!(merged.len(), 2);
    assert_eq!(
        merged.messages()[1].last_text(),
        Some("<outputFoo>done</outputFoo>\n<outputFoo>whole</outputFoo>")
    );
    Ok(())
}

#[tokio::test]
async fn test_shared_conversation_is_not_mutated() -> Result<()> {
    let shared = Conversation::new().with_message(Message::user().with_text("Hello"));
    let (first, _) = anthropic_agent(vec![anthropic_reply(
        json!([{"type": "text", "text": "one"}]),
        "end_turn",
        1,
        1,
    )]);
    let (second, _) = anthropic_agent(vec![anthropic_reply(
        json!([{"type": "text", "text": "two"}]),
        "end_turn",
        1,
        1,
    )]);

    let (a, b) = tokio::join!(
        first.run(Request::new(ModelInfo::claude_sonnet_4_5(), shared.clone())),
        second.run(Request::new(ModelInfo::claude_sonnet_4_5(), shared.clone())),
    );

    assert_eq!(shared.len(), 1);
    assert_eq!(a?.last_text()?, "one");
    assert_eq!(b?.conversation().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_openai_tool_round() -> Result<()> {
    let transport = ScriptedTransport::new(vec![
        json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Brno\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 10}
        }),
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Sunny."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 3}
        }),
    ]);
    let provider = OpenAiProvider::new(OpenAiProviderConfig::new("test_api_key"));
    let agent = Agent::new(ProviderClient::new(provider, transport.clone()));

    let request = Request::new(
        ModelInfo::gpt_4_1(),
        Conversation::new().with_message(Message::user().with_text("Weather in Brno?")),
    )
    .with_tool(weather_tool());
    let response = agent.run(request).await?;

    assert_eq!(response.last_text()?, "Sunny.");
    assert_eq!(response.usage().input_tokens, 60);

    let resent = &transport.sent()[1]["messages"];
    let tool_message = resent
        .as_array()
        .unwrap()
        .iter()
        .find(|message| message["role"] == "tool")
        .unwrap();
    assert_eq!(tool_message["tool_call_id"], "call_1");
    assert_eq!(tool_message["content"], "Sunny in Brno");
    Ok(())
}

#[tokio::test]
async fn test_text_editor_through_agent() -> Result<()> {
    let storage = MemoryStorage::new();
    storage.create_file("notes.txt", "alpha\nbeta")?;
    let editor = Arc::new(TextEditorTool::new(storage));

    let (agent, _) = anthropic_agent(vec![
        anthropic_reply(
            json!([{
                "type": "tool_use",
                "id": "toolu_1",
                "name": "str_replace_based_edit_tool",
                "input": {"command": "str_replace", "path": "notes.txt", "old_str": "beta", "new_str": "gamma"}
            }]),
            "tool_use",
            10,
            10,
        ),
        anthropic_reply(json!([{"type": "text", "text": "Edited."}]), "end_turn", 10, 10),
    ]);

    let request = user_request("Rename beta").with_tool(editor.clone());
    let response = agent.run(request).await?;

    assert_eq!(response.last_text()?, "Edited.");
    assert_eq!(editor.storage().get_file("notes.txt")?, "alpha\ngamma");
    Ok(())
}
