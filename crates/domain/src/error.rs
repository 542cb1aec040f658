/// Shared error type used across all skills-runner crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    /// The remote model broke the response contract (e.g. a final message
    /// without text content).
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("tool loop limit reached ({0} iterations)")]
    ToolLoopLimit(usize),

    #[error("turn cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
