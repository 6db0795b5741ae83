//! Error type for LLM client calls.

use thiserror::Error;

/// Failure modes of a chat-completion round trip.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request never completed (connect failure, timeout, TLS, ...).
    #[error("llm request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("llm provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The completion arrived but carried no usable choices.
    #[error("llm completion contained no content")]
    MissingContent,
}
