use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::conversation::Conversation;
use super::message::Message;
use super::request::{Request, Usage};
use crate::errors::AgentError;

/// Why a model stopped, in the same vocabulary for every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum StopReason {
    Finished,
    ToolUse,
    Length,
    Safety,
}

/// A finished turn: the stop reason plus the request as it stood when the model stopped
#[derive(Debug, Clone)]
pub struct Response {
    stop_reason: StopReason,
    request: Request,
}

impl Response {
    pub fn new(stop_reason: StopReason, request: Request) -> Self {
        Self {
            stop_reason,
            request,
        }
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn conversation(&self) -> &Conversation {
        self.request.conversation()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.request.last_message()
    }

    pub fn usage(&self) -> &Usage {
        self.request.usage()
    }

    /// The most recent text in the last message
    pub fn last_text(&self) -> Result<&str, AgentError> {
        self.last_message()
            .and_then(Message::last_text)
            .ok_or(AgentError::MissingText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::model::ModelInfo;
    use serde_json::json;

    #[test]
    fn test_last_text_scans_backward() {
        let conversation = Conversation::new().with_message(
            Message::assistant()
                .with_text("thinking out loud")
                .with_text("final")
                .with_tool_use("1", "noop", json!({})),
        );
        let response = Response::new(
            StopReason::ToolUse,
            Request::new(ModelInfo::gpt_4_1(), conversation),
        );
        assert_eq!(response.last_text().unwrap(), "final");
    }

    #[test]
    fn test_last_text_missing() {
        let conversation =
            Conversation::new().with_message(Message::assistant().with_tool_use("1", "noop", json!({})));
        let response = Response::new(
            StopReason::ToolUse,
            Request::new(ModelInfo::gpt_4_1(), conversation),
        );
        assert!(matches!(response.last_text(), Err(AgentError::MissingText)));
    }
}
