use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

/// Failure talking to the messaging provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Request to messaging provider failed: {0}")]
    Request(String),

    #[error("WhatsApp API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Unexpected response from messaging provider: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Request(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Messaging configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Reminder tick timed out after {timeout_seconds} seconds")]
    TickTimeout { timeout_seconds: u64 },
}

impl From<ReminderError> for AppError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::Validation(msg) => AppError::ValidationError(msg),
            ReminderError::NotFound(msg) => AppError::NotFound(msg),
            ReminderError::Storage(StoreError::NotFound(what)) => {
                AppError::NotFound(format!("{} not found", what))
            }
            ReminderError::Storage(e) => AppError::Database(e.to_string()),
            ReminderError::Config(msg) => AppError::Unavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
