use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{AgentError, AgentResult};
use crate::models::content::{Content, ToolUse};
use crate::models::message::Message;
use crate::models::model::ModelFamily;
use crate::models::request::Request;
use crate::models::response::{Response, StopReason};
use crate::models::role::Role;
use crate::providers::base::{Decoded, ModelClient};
use crate::schema;
use crate::tool::{find_tool, ToolDefinition};

/// Where a run stands between two steps
#[derive(Debug, Clone)]
pub enum AgentState {
    /// The request goes to the model next
    Sending(Request),
    /// The model asked for tools; their results go back in the next request
    AwaitingTools(Response),
    /// The model ran out of output tokens and a continuation callback is set
    Continuing(Response),
    /// No pending work, apart from any feedback the caller wants to give
    Done(Response),
}

impl AgentState {
    /// Classify what a provider decoded
    pub fn after_reply(decoded: Decoded) -> Self {
        let response = match decoded {
            Decoded::Request(request) => return AgentState::Sending(request),
            Decoded::Response(response) => response,
        };
        let has_tools = response
            .last_message()
            .map(Message::has_tool_use)
            .unwrap_or(false);

        match response.stop_reason() {
            StopReason::ToolUse if has_tools => AgentState::AwaitingTools(response),
            StopReason::Length if response.request().continuation().is_some() => {
                AgentState::Continuing(response)
            }
            _ => AgentState::Done(response),
        }
    }

    /// Apply the request a continuation callback produced for a truncated turn
    ///
    /// A request ending in an assistant message means the callback settled the turn itself.
    pub fn after_continuation(response: &Response, next: Request) -> AgentResult<Self> {
        match next.last_message() {
            None => Err(AgentError::CallbackContract(
                "continuation returned an empty conversation".to_string(),
            )),
            Some(message) if message.role == Role::Assistant => Ok(AgentState::Done(
                Response::new(response.stop_reason(), next),
            )),
            Some(_) => Ok(AgentState::Sending(next)),
        }
    }

    /// Apply what the feedback callback returned; `None` ends the run, any message is appended
    /// and sent
    pub fn after_feedback(response: &Response, feedback: Option<Message>) -> Option<Self> {
        feedback.map(|message| AgentState::Sending(response.request().with_message(message)))
    }
}

/// Drives a request through tool calls, continuations and feedback until the model is done
pub struct Agent<C: ModelClient> {
    client: C,
}

impl<C: ModelClient> Agent<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run the request to completion. The returned response carries the usage of every turn.
    pub async fn run(&self, request: Request) -> AgentResult<Response> {
        info!(
            model = %request.model().code,
            thread = %request.conversation().thread_id(),
            "starting agent run"
        );
        let mut state = AgentState::Sending(request);
        loop {
            state = match state {
                AgentState::Sending(request) => {
                    let decoded = self.client.send(request).await?;
                    AgentState::after_reply(decoded)
                }
                AgentState::AwaitingTools(response) => {
                    let results = self.run_tools(&response).await?;
                    AgentState::Sending(response.request().with_message(results))
                }
                AgentState::Continuing(response) => {
                    debug!("output truncated, asking for a continuation");
                    let next = match response.request().continuation() {
                        Some(continuation) => continuation(&response).map_err(AgentError::Callback)?,
                        None => return Ok(response),
                    };
                    AgentState::after_continuation(&response, next)?
                }
                AgentState::Done(response) => {
                    let feedback = match response.request().feedback() {
                        Some(feedback) => feedback(&response).map_err(AgentError::Callback)?,
                        None => None,
                    };
                    match AgentState::after_feedback(&response, feedback) {
                        Some(next) => next,
                        None => {
                            let usage = response.usage();
                            info!(
                                stop_reason = %response.stop_reason(),
                                input_tokens = usage.input_tokens,
                                output_tokens = usage.output_tokens,
                                cost = usage.total_cost(),
                                "agent run finished"
                            );
                            return Ok(response);
                        }
                    }
                }
            };
        }
    }

    /// Run every tool the last assistant message asked for, concurrently, and collect the
    /// results in call order into one user message
    async fn run_tools(&self, response: &Response) -> AgentResult<Message> {
        let request = response.request();
        let family = request.model().family;
        let tool_uses: Vec<&ToolUse> = response
            .last_message()
            .map(|message| message.tool_uses().collect())
            .unwrap_or_default();

        let futures: Vec<_> = tool_uses
            .iter()
            .map(|tool_use| dispatch_tool_use(request.tools(), family, tool_use))
            .collect();
        let results = join_all(futures).await;

        let mut message = Message::user();
        for result in results {
            message = message.with_content(result?);
        }
        Ok(message)
    }
}

async fn dispatch_tool_use(
    tools: &[Arc<dyn ToolDefinition>],
    family: ModelFamily,
    tool_use: &ToolUse,
) -> AgentResult<Content> {
    let Some(tool) = find_tool(tools, &tool_use.name, family) else {
        debug!(tool = %tool_use.name, "model called an unknown tool");
        return Ok(Content::tool_result(
            &tool_use.id,
            vec![Content::text(format!("Tool not found: {}", tool_use.name))],
        ));
    };

    let schema = tool.input_schema();
    if schema::should_validate(schema, &tool_use.input) {
        if let Err(issues) = schema::validate(schema, &tool_use.input) {
            debug!(tool = %tool_use.name, "tool input failed schema validation");
            return Ok(Content::tool_result(
                &tool_use.id,
                vec![Content::text(format!(
                    "ERROR: Input is not matching expected schema: {}",
                    schema::describe(&issues)
                ))],
            ));
        }
    }

    debug!(tool = %tool_use.name, id = %tool_use.id, "calling tool");
    let contents = tool
        .handle(tool_use.input.clone())
        .await
        .map_err(|source| AgentError::ToolFailed {
            name: tool_use.name.clone(),
            source,
        })?;
    Ok(Content::tool_result(&tool_use.id, contents))
}
