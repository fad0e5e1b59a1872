//! These models represent the objects passed between the caller, the agent and the providers
//!
//! Every provider speaks its own wire format:
//! - anthropic messages, with a top level system prompt and typed content blocks
//! - openai chat completions, with tool calls on a dedicated assistant message
//! - gemini contents/parts, with a separate system instruction
//!
//! We never pass those formats around. Encoders convert the internal structs to and from
//! the wire at the edge, so the internal models are not an exact match to any of them.
//! All of these values are immutable: transformations return a new value.
pub mod content;
pub mod conversation;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod role;
