use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use super::base::{Decoded, ModelClient};
use crate::errors::AgentResult;
use crate::models::message::Message;
use crate::models::request::Request;
use crate::models::response::{Response, StopReason};

/// A mock client that returns pre-configured turns for testing
///
/// Every turn is billed 10 input and 5 output tokens at one cent each way.
pub struct MockClient {
    responses: Arc<Mutex<Vec<(StopReason, Message)>>>,
    received: Arc<Mutex<Vec<Request>>>,
}

impl MockClient {
    /// Create a new mock client with a sequence of turns
    pub fn new(responses: Vec<(StopReason, Message)>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests seen so far, in order
    pub fn received(&self) -> Vec<Request> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockClient {
    async fn send(&self, request: Request) -> AgentResult<Decoded> {
        self.received.lock().unwrap().push(request.clone());
        let (stop_reason, message) = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                // Return empty response if no more pre-configured responses
                (StopReason::Finished, Message::assistant().with_text(""))
            } else {
                responses.remove(0)
            }
        };
        let request = request.with_message(message).with_cost(10, 5, 0.01, 0.01);
        Ok(Decoded::Response(Response::new(stop_reason, request)))
    }
}
