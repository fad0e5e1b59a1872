//! Helpers for resuming a turn the model cut short by hitting its token limit
//!
//! [`continue_tag_response`] folds earlier continuation rounds back into single assistant
//! turns, trims any tagged output block left unfinished and asks the model to carry on.
//! [`tag_continuation`] wraps it as a ready made continuation callback.
use anyhow::Result;

use crate::models::content::Content;
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::models::request::Request;
use crate::models::response::Response;
use crate::models::role::Role;

pub const CONTINUE_TEXT: &str = "Continue";

/// Drop a trailing `<tag ...` block that has no closing `</tag>`, then trim trailing whitespace
pub fn remove_incomplete_output_tags<S: AsRef<str>>(text: &str, tags: &[S]) -> String {
    let mut text = text;
    for tag in tags {
        let tag = tag.as_ref();
        let opening = text.rfind(&format!("<{}", tag));
        let closing = text.rfind(&format!("</{}>", tag));
        match (opening, closing) {
            (Some(open), None) => text = &text[..open],
            (Some(open), Some(close)) if open > close => text = &text[..open],
            _ => {}
        }
    }
    text.trim_end().to_string()
}

fn extend_turn(turn: &mut Message, continued: &Message) {
    let mut rest = continued.content.iter();
    if let (Some(Content::Text(previous)), Some(Content::Text(next))) =
        (turn.content.last_mut(), continued.content.first())
    {
        previous.text.push_str(&next.text);
        rest.next();
    }
    turn.content.extend(rest.cloned());
}

/// The conversation with every continuation round folded into the assistant turn it extends
///
/// A continuation request is only elided when an assistant reply follows it; text blocks meeting
/// at the seam are joined into one.
pub fn merge_continuations(conversation: &Conversation) -> Conversation {
    let messages = conversation.messages();
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    let mut joining = false;

    for (i, message) in messages.iter().enumerate() {
        if message.is_continuation && message.role == Role::User {
            let follows_assistant = merged.last().map_or(false, |m| m.role == Role::Assistant);
            let precedes_assistant = messages
                .get(i + 1)
                .map_or(false, |m| m.role == Role::Assistant);
            if follows_assistant && precedes_assistant {
                joining = true;
                continue;
            }
        }

        if std::mem::take(&mut joining) {
            if let Some(turn) = merged.last_mut() {
                extend_turn(turn, message);
                continue;
            }
        }
        merged.push(message.clone());
    }

    conversation.with_messages(merged)
}

/// The request to send after a truncated turn whose output uses the given tags
pub fn continue_tag_response<S: AsRef<str>>(request: &Request, tags: &[S], text: &str) -> Request {
    let merged = merge_continuations(request.conversation());
    let mut messages = merged.messages().to_vec();

    if let Some(last) = messages.last_mut().filter(|m| m.role == Role::Assistant) {
        let last_text = last.content.iter_mut().rev().find_map(|content| match content {
            Content::Text(text) => Some(text),
            _ => None,
        });
        if let Some(last_text) = last_text {
            last_text.text = remove_incomplete_output_tags(&last_text.text, tags);
        }
    }

    request
        .with_conversation(merged.with_messages(messages))
        .with_message(Message::continuation(text))
}

/// A continuation callback that resumes tagged output with a "Continue" message
pub fn tag_continuation<S>(tags: impl IntoIterator<Item = S>) -> impl Fn(&Response) -> Result<Request> + Send + Sync + 'static
where
    S: Into<String>,
{
    let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
    move |response: &Response| Ok(continue_tag_response(response.request(), &tags, CONTINUE_TEXT))
}
