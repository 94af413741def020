//! Error types and Problem Details implementation.

use crate::framing::FrameError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned by synapse handlers and surfaced to the calling peer.
#[derive(Debug, thiserror::Error)]
pub enum SynapseError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("framing error: {0}")]
    Framing(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("problem details: {0}")]
    ProblemDetails(ProblemDetails),
}

impl SynapseError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            SynapseError::InvalidRequest(_) | SynapseError::Framing(_) => StatusCode::BAD_REQUEST,
            SynapseError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SynapseError::Internal(_) | SynapseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SynapseError::ProblemDetails(pd) => pd.status_code(),
        }
    }

    /// Convert into an RFC 7807 body for the wire.
    pub fn to_problem_details(&self) -> ProblemDetails {
        match self {
            SynapseError::ProblemDetails(pd) => pd.clone(),
            SynapseError::InvalidRequest(msg) => {
                ProblemDetails::new(self.status(), "Invalid request").with_detail(msg.clone())
            }
            SynapseError::Unavailable(msg) => {
                ProblemDetails::new(self.status(), "Service unavailable").with_detail(msg.clone())
            }
            SynapseError::Internal(msg) => {
                ProblemDetails::new(self.status(), "Internal error").with_detail(msg.clone())
            }
            SynapseError::Framing(err) => {
                ProblemDetails::new(self.status(), "Malformed stream").with_detail(err.to_string())
            }
            SynapseError::Io(err) => {
                ProblemDetails::new(self.status(), "I/O failure").with_detail(err.to_string())
            }
        }
    }
}

/// Problem Details per RFC 7807
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary
    pub title: String,

    /// HTTP status code
    pub status: u16,

    /// Human-readable explanation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference identifying the specific occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Create a new Problem Details with the given status and title
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: format!("urn:synapse:error:{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    /// Set the detail field
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the instance field, usually the request path
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Status as an `http::StatusCode`; out-of-range values become 500.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a response body
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.title)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}
