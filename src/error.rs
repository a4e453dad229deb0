//! Error types.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Startup configuration problems. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown {field} mode '{value}'")]
    UnknownMode { field: &'static str, value: String },
}

/// Failures from the language-model API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("invalid API credential: {0}")]
    InvalidCredential(String),

    #[error("quota or rate limit exceeded: {0}")]
    QuotaExceeded(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("empty response from provider")]
    EmptyResponse,
}

/// Failures while pulling text out of an attached document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("unreadable document: {0}")]
    Malformed(String),

    #[error("document is password protected")]
    PasswordProtected,

    #[error("No text extracted from PDF")]
    Empty,
}

/// Failures on the outbound side of the chat platform.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("message of {length} characters exceeds the platform ceiling of {ceiling}")]
    ExceedsCeiling { length: usize, ceiling: usize },

    #[error("platform not connected")]
    NotConnected,

    #[error("inbound stream closed before shutdown")]
    Disconnected,

    #[error("failed to send message: {0}")]
    SendFailed(String),

    #[error("failed to download attachment {filename}: {reason}")]
    Download { filename: String, reason: String },
}
