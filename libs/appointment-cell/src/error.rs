use chrono::{DateTime, Utc};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid appointment: {0}")]
    Validation(String),

    #[error("Appointment from {start} to {end} overlaps an existing booking")]
    Conflict { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("Appointment from {start} to {end} is outside business hours")]
    OutOfHours { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::Conflict { .. } => AppError::Conflict(err.to_string()),
            SchedulingError::OutOfHours { .. } => AppError::OutOfHours(err.to_string()),
            SchedulingError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}
