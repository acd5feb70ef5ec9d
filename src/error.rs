use thiserror::Error;

/// Errors surfaced by the signal engine to its callers.
///
/// Storage plumbing stays on `anyhow` and is wrapped in [`SignalError::Storage`]
/// at the service boundary.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("no events recorded for candidate {candidate_id} on task {task_id}")]
    MissingSession { candidate_id: i64, task_id: i64 },

    #[error("{collaborator} timed out after {timeout_ms}ms")]
    EvaluatorTimeout {
        collaborator: &'static str,
        timeout_ms: u64,
    },

    #[error("{collaborator} failed: {message}")]
    EvaluatorFailure {
        collaborator: &'static str,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SignalError {
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        SignalError::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// True for errors raised by an external collaborator rather than by the core.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            SignalError::EvaluatorTimeout { .. } | SignalError::EvaluatorFailure { .. }
        )
    }
}

pub type SignalResult<T> = std::result::Result<T, SignalError>;
