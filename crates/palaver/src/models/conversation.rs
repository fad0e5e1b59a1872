use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

/// An ordered, append-only history of messages
///
/// Appending returns a new conversation, so two requests built from the same value never see
/// each other's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    thread_id: Uuid,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            messages,
        }
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn with_message(&self, message: Message) -> Self {
        let mut messages = self.messages.clone();
        messages.push(message);
        Self {
            thread_id: self.thread_id,
            messages,
        }
    }

    /// Same thread with a rewritten history, used when collapsing continuation turns
    pub(crate) fn with_messages(&self, messages: Vec<Message>) -> Self {
        Self {
            thread_id: self.thread_id,
            messages,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_message_leaves_original_untouched() {
        let base = Conversation::new().with_message(Message::user().with_text("hi"));
        let left = base.with_message(Message::assistant().with_text("left"));
        let right = base.with_message(Message::assistant().with_text("right"));

        assert_eq!(base.len(), 1);
        assert_eq!(left.len(), 2);
        assert_eq!(right.last().and_then(Message::last_text), Some("right"));
        assert_eq!(left.thread_id(), base.thread_id());
    }

    #[test]
    fn test_serde_keeps_thread_id() {
        let conversation = Conversation::new().with_message(Message::user().with_text("hi"));
        let json = serde_json::to_string(&conversation).unwrap();
        let parsed: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, conversation);
    }
}
