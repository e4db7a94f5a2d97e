//! Application error type.

use finanboard_core::FinanError;
use finanboard_mutation::MutationError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error(transparent)]
    Finan(#[from] FinanError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("Telemetry initialization failed: {reason}")]
    Telemetry { reason: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Finan(err) => err.user_message(),
            AppError::Mutation(err) => err.user_message(),
            AppError::Telemetry { .. } => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// The underlying data-layer error, if any.
    pub fn cause(&self) -> Option<&FinanError> {
        match self {
            AppError::Finan(err) => Some(err),
            AppError::Mutation(err) => Some(err.cause()),
            AppError::Telemetry { .. } => None,
        }
    }
}
