//! Failures of a single gateway call.
//!
//! None of these leave the orchestrator: they are logged and the affected
//! piece of state is left as it was.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The gateway answered with a non-success status.
    #[error("{operation} request failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The body was not the structured data we expected.
    #[error("{operation} response was malformed: {reason}")]
    Malformed {
        operation: &'static str,
        reason: String,
    },
}

impl GatewayError {
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayError::Transport { operation, .. }
            | GatewayError::Status { operation, .. }
            | GatewayError::Malformed { operation, .. } => operation,
        }
    }
}
