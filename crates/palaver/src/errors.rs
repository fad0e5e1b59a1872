use thiserror::Error;

/// A request or reply that a provider cannot represent. These are never coerced.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("Unsupported message role: {0}")]
    UnsupportedRole(String),

    #[error("Unsupported stop reason \"{0}\"")]
    UnsupportedStopReason(String),

    #[error("Unsupported reasoning config: {0}")]
    UnsupportedReasoning(String),

    #[error("{0}")]
    InvalidSystemMessage(String),

    #[error("PDF content type not supported for {0}")]
    PdfNotSupported(String),

    #[error("Invalid tool name: {0}")]
    InvalidToolName(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Faults that end an agent run
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Transport failed: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("Tool {name} failed: {source}")]
    ToolFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Callback contract violated: {0}")]
    CallbackContract(String),

    #[error("Callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    #[error("No text content in the last message")]
    MissingText,
}

pub type AgentResult<T> = Result<T, AgentError>;
