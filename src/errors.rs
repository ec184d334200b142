//! Error types for the answerdesk engine
//!
//! One typed taxonomy for the whole pipeline: validation failures are
//! rejected immediately, transient provider failures are retryable,
//! consistency findings are flagged for maintenance, and budget trips
//! degrade to a best-effort answer instead of failing the request.

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad input: unsupported file type, oversized upload, unknown category.
    /// Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding, LLM, or vector-store outage. Retryable with bounded
    /// backoff; surfaced only after retries exhaust.
    #[error("Provider unavailable ({provider}): {reason}")]
    TransientProvider { provider: String, reason: String },

    /// Cross-store consistency violation (orphaned vector, partial delete).
    /// Logged and flagged, does not fail unrelated in-flight requests.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// Iteration or time budget exceeded during a turn.
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    /// The router produced a category outside the known set.
    #[error("Routing contract violation: {candidate:?} not in known categories")]
    RoutingContract { candidate: String },

    /// Tool name not present in the registry. A programming error in the
    /// caller, surfaced rather than ignored.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool input failed schema validation
    #[error("Invalid tool input for {tool}: {reason}")]
    ToolInput { tool: String, reason: String },

    /// State machine transition errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Model produced output that could not be parsed after retry
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    /// Record lookup failures
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation timed out
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether a bounded retry may resolve this error.
    ///
    /// Transient provider failures, timeouts, and transport errors are
    /// retryable; everything else is permanent for the current request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransientProvider { .. }
                | EngineError::Timeout { .. }
                | EngineError::Http(_)
        )
    }

    /// Shorthand for a transient provider failure
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::TransientProvider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
