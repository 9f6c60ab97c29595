//! Error types for the agent execution core.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-kind for a [`Error::ToolExecution`] failure, distinguishing an outright
/// tool panic/error from one caused by exceeding the per-call timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolExecutionKind {
    /// The tool returned an error or panicked while running.
    Failed,
    /// The tool did not complete within its allotted timeout.
    Timeout,
}

/// Main error type for the agent core.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error, surfaced while reading skill frontmatter.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error, surfaced by config loading, skill discovery, and
    /// trajectory recording.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (missing credential, unparseable config file).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport, decode, or authentication failure talking to a provider.
    #[error("Provider error: {0}")]
    Provider(String),

    /// API error from the model server (non-streaming call failed).
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error (SSE parse failure, malformed chunk).
    #[error("Streaming error: {0}")]
    Stream(String),

    /// A tool call named a tool that is not in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A registered tool failed or timed out while executing.
    #[error("Tool execution error ({kind:?}): {message}")]
    ToolExecution {
        kind: ToolExecutionKind,
        message: String,
    },

    /// The user declined to confirm a pending tool call.
    #[error("Tool call rejected by user: {0}")]
    ToolRejectedByUser(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// The task was cancelled by the UI before it completed.
    #[error("Cancelled: {0}")]
    Cancellation(String),

    /// A turn or task exceeded its configured iteration/turn budget.
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    /// An internal invariant was violated (e.g. a tool result with no
    /// matching tool call in history). Indicates a bug rather than bad input.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool-not-found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Error::ToolNotFound(name.into())
    }

    /// Create a new tool execution error
    pub fn tool_execution(kind: ToolExecutionKind, msg: impl Into<String>) -> Self {
        Error::ToolExecution {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new tool-rejected-by-user error. Callers typically pass
    /// `"rejected by user"`, optionally qualified with the tool name.
    pub fn tool_rejected(msg: impl Into<String>) -> Self {
        Error::ToolRejectedByUser(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a new cancellation error
    pub fn cancellation(msg: impl Into<String>) -> Self {
        Error::Cancellation(msg.into())
    }

    /// Create a new budget-exceeded error
    pub fn budget_exceeded(msg: impl Into<String>) -> Self {
        Error::BudgetExceeded(msg.into())
    }

    /// Create a new invariant-violation error
    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error recovers locally (produces a synthetic tool item
    /// and continues the task) rather than ending the task outright.
    ///
    /// `ToolNotFound`, `ToolExecution`, and `ToolRejectedByUser` are recovered
    /// in place; everything else ends the task.
    pub fn is_tool_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_) | Error::ToolExecution { .. } | Error::ToolRejectedByUser(_)
        )
    }
}
