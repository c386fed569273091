use thiserror::Error;

/// Errors raised by the quiz factory. Construction is the only place the
/// domain model is allowed to fail: an unknown discriminant or a malformed
/// payload must never produce a partially-initialized quiz.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unsupported quiz type: {0}")]
    UnsupportedType(String),

    #[error("invalid quiz payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("invalid quiz '{quiz_id}': {reason}")]
    InvalidQuiz { quiz_id: String, reason: String },
}
