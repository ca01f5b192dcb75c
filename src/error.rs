use thiserror::Error;

/// Failure taxonomy for worksheet access and entity operations.
///
/// Every fallible operation in the crate reports one of these variants; none
/// of them is retried automatically and none is fatal to the process. The
/// current render reports the failure and the next interaction may try again.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad credentials or an invalid session.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The sheet or the addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The sheet backend rejected the call (malformed range, column count
    /// mismatch, quota).
    #[error("sheet API error: {0}")]
    Api(String),

    /// Transient connectivity failure while talking to the sheet backend.
    #[error("network error: {0}")]
    Network(String),

    /// Input rejected before any write was issued.
    #[error("{0}")]
    Validation(String),
}

impl AppError {
    /// True for errors worth reporting verbatim to the user. Login failures
    /// are collapsed to a generic message at the auth handler instead.
    pub fn is_user_fault(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}
