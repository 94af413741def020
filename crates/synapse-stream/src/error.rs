//! Streaming exchange errors.

use std::fmt;
use std::time::Duration;

use synapse_core::{FrameError, SynapseError};
use synapse_tensor::TensorError;

/// Why a chunked exchange ended before its end-of-stream signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// No chunk arrived within the idle timeout
    Timeout(Duration),
    /// The peer went away without signalling end of stream
    Disconnected,
    /// The producer cancelled the stream
    Cancelled(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout(after) => write!(f, "no chunk within {}ms", after.as_millis()),
            AbortReason::Disconnected => f.write_str("peer disconnected"),
            AbortReason::Cancelled(reason) => write!(f, "cancelled by producer: {reason}"),
        }
    }
}

/// Failure of a streaming exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("stream aborted: {0}")]
    Aborted(AbortReason),

    #[error("chunk out of order: expected sequence {expected}, got {found}")]
    OutOfOrder { expected: u64, found: u64 },

    #[error("response body already consumed")]
    AlreadyConsumed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("producer failed: {0}")]
    Producer(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Framing(#[from] FrameError),
}

impl StreamError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StreamError::Aborted(_))
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            StreamError::Aborted(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<StreamError> for SynapseError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Framing(e) => SynapseError::Framing(e),
            StreamError::Tensor(_) | StreamError::Protocol(_) => {
                SynapseError::InvalidRequest(err.to_string())
            }
            StreamError::Aborted(AbortReason::Timeout(_)) => SynapseError::Unavailable(err.to_string()),
            other => SynapseError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_display() {
        let err = StreamError::Aborted(AbortReason::Timeout(Duration::from_millis(250)));
        assert_eq!(err.to_string(), "stream aborted: no chunk within 250ms");

        let err = StreamError::Aborted(AbortReason::Cancelled("boom".into()));
        assert_eq!(err.abort_reason(), Some(&AbortReason::Cancelled("boom".into())));
    }

    #[test]
    fn test_synapse_error_mapping() {
        let err: SynapseError = StreamError::Tensor(TensorError::InvalidDType("x".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: SynapseError =
            StreamError::Aborted(AbortReason::Timeout(Duration::from_secs(1))).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: SynapseError = StreamError::Producer("crash".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
