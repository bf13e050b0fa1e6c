use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_models::BusinessHourInterval;

use crate::services::{AppointmentConflictValidator, BusinessHoursResolver};

/// Shared state for the appointment routes.
pub struct SchedulingState {
    pub validator: AppointmentConflictValidator,
}

impl SchedulingState {
    pub fn new(validator: AppointmentConflictValidator) -> Arc<Self> {
        Arc::new(Self { validator })
    }

    pub fn resolver(&self) -> &BusinessHoursResolver {
        self.validator.resolver()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentCheckResponse {
    pub valid: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessHoursResponse {
    pub date: NaiveDate,
    pub iso_weekday: u32,
    pub is_closed: bool,
    pub intervals: Vec<BusinessHourInterval>,
}
