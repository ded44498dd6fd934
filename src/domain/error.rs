use thiserror::Error;

/// Reason a call was rejected.
///
/// Every failure discards the whole call. The variant is the
/// machine-checkable kind, the message is the human reason string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuretyError {
    /// The operational gate is closed.
    #[error("contract is currently not operational")]
    Operational,

    /// Caller lacks the role the operation needs.
    #[error("{0}")]
    Authorization(String),

    /// Structurally invalid input.
    #[error("{0}")]
    Validation(String),

    /// Entity state does not satisfy the precondition.
    #[error("{0}")]
    State(String),

    /// The ledger refused to move value.
    #[error("value transfer failed: {0}")]
    Transfer(String),
}

impl SuretyError {
    pub fn authorization(reason: impl Into<String>) -> Self {
        SuretyError::Authorization(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        SuretyError::Validation(reason.into())
    }

    pub fn state(reason: impl Into<String>) -> Self {
        SuretyError::State(reason.into())
    }

    /// Stable error kind for callers that branch on it.
    pub fn code(&self) -> &'static str {
        match self {
            SuretyError::Operational => "OPERATIONAL_ERROR",
            SuretyError::Authorization(_) => "AUTHORIZATION_ERROR",
            SuretyError::Validation(_) => "VALIDATION_ERROR",
            SuretyError::State(_) => "STATE_ERROR",
            SuretyError::Transfer(_) => "TRANSFER_ERROR",
        }
    }
}

pub type SuretyResult<T> = Result<T, SuretyError>;
