//! Dendrite errors.

use http::StatusCode;
use synapse_core::ProblemDetails;
use synapse_stream::StreamError;

#[derive(Debug, thiserror::Error)]
pub enum DendriteError {
    #[error("invalid request target: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The axon answered with a non-success status.
    #[error("axon returned {status}{}", problem_suffix(.problem))]
    Status {
        status: StatusCode,
        problem: Option<ProblemDetails>,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl DendriteError {
    /// HTTP status reported by the axon, if the exchange got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DendriteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn problem(&self) -> Option<&ProblemDetails> {
        match self {
            DendriteError::Status { problem, .. } => problem.as_ref(),
            _ => None,
        }
    }
}

fn problem_suffix(problem: &Option<ProblemDetails>) -> String {
    problem
        .as_ref()
        .map(|pd| format!(": {pd}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_stream::AbortReason;

    #[test]
    fn test_status_display_includes_problem() {
        let err = DendriteError::Status {
            status: StatusCode::NOT_FOUND,
            problem: Some(ProblemDetails::new(StatusCode::NOT_FOUND, "Synapse not found")),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().starts_with("axon returned 404 Not Found: "));
        assert!(err.to_string().contains("Synapse not found"));
    }

    #[test]
    fn test_stream_error_is_transparent() {
        let err = DendriteError::from(StreamError::Aborted(AbortReason::Disconnected));
        assert_eq!(
            err.to_string(),
            StreamError::Aborted(AbortReason::Disconnected).to_string()
        );
        assert!(err.problem().is_none());
    }
}
