use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{Datelike, NaiveDate};

use shared_models::error::AppError;
use shared_models::AppointmentCandidate;

use crate::models::{AppointmentCheckResponse, BusinessHoursResponse, SchedulingState};

/// Dry-run validation for a proposed appointment. Errors map to 400 for
/// malformed candidates, 409 for overlaps and 422 for out-of-hours.
#[axum::debug_handler]
pub async fn check_appointment(
    State(state): State<Arc<SchedulingState>>,
    payload: Result<Json<AppointmentCandidate>, JsonRejection>,
) -> Result<Json<AppointmentCheckResponse>, AppError> {
    let Json(candidate) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let end_time = state.validator.validate_candidate(&candidate).await?;

    Ok(Json(AppointmentCheckResponse {
        valid: true,
        start_time: candidate.start_time,
        end_time,
    }))
}

#[axum::debug_handler]
pub async fn get_business_hours(
    State(state): State<Arc<SchedulingState>>,
    Path(date): Path<String>,
) -> Result<Json<BusinessHoursResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", date)))?;

    let intervals = state.resolver().resolve(date).await?;

    Ok(Json(BusinessHoursResponse {
        date,
        iso_weekday: date.weekday().number_from_monday(),
        is_closed: intervals.is_empty(),
        intervals,
    }))
}
