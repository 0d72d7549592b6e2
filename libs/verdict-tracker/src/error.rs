use thiserror::Error;

/// The job could not be created; no polling starts
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    InvalidPayload(String),

    #[error("judge rejected submission ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("submission request failed: {0}")]
    Transport(String),

    #[error("unexpected submission response: {0}")]
    MalformedResponse(String),
}

/// A single status check failed. Transient while polling.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("status request failed: {0}")]
    Transport(String),

    #[error("status request returned HTTP {0}")]
    Status(u16),

    #[error("undecodable status response: {0}")]
    Decode(String),
}

/// Bulk test-case import could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
