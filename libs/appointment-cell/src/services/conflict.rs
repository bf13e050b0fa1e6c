use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::AppointmentStore;
use shared_models::{AppointmentCandidate, BusinessHourInterval, MAX_DURATION_MINUTES};

use crate::error::SchedulingError;
use crate::services::business_hours::BusinessHoursResolver;

/// Decides whether a proposed appointment may be booked. Checks run in a
/// fixed order: malformed input, then overlap, then business hours.
///
/// Nothing is locked between this check and the caller's insert; the
/// database constraint on `appointments` is what rejects a booking that
/// raced past validation.
pub struct AppointmentConflictValidator {
    appointments: Arc<dyn AppointmentStore>,
    resolver: Arc<BusinessHoursResolver>,
    clinic_offset: FixedOffset,
}

impl AppointmentConflictValidator {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        resolver: Arc<BusinessHoursResolver>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            appointments,
            resolver,
            clinic_offset,
        }
    }

    pub fn resolver(&self) -> &BusinessHoursResolver {
        &self.resolver
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_offset
    }

    /// Validates a full candidate row, including the identity rule.
    /// Returns the candidate's end instant.
    pub async fn validate_candidate(
        &self,
        candidate: &AppointmentCandidate,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        if !candidate.has_identity() {
            return Err(SchedulingError::Validation(
                "either patient_id or patient_name is required".to_string(),
            ));
        }
        if !(1..=MAX_DURATION_MINUTES).contains(&candidate.duration_minutes) {
            return Err(SchedulingError::Validation(format!(
                "duration_minutes must be between 1 and {}, got {}",
                MAX_DURATION_MINUTES, candidate.duration_minutes
            )));
        }
        let end = candidate.end_time().ok_or_else(|| {
            SchedulingError::Validation(format!(
                "start_time {} plus {} minutes is out of range",
                candidate.start_time, candidate.duration_minutes
            ))
        })?;

        self.validate(candidate.start_time, end, candidate.exclude_appointment_id)
            .await?;
        Ok(end)
    }

    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(format!(
                "end {} must be after start {}",
                end, start
            )));
        }

        if self
            .appointments
            .has_overlapping_appointment(start, end, exclude_id)
            .await?
        {
            info!("Rejecting {} - {}: overlaps an existing appointment", start, end);
            return Err(SchedulingError::Conflict { start, end });
        }

        let local_date = start.with_timezone(&self.clinic_offset).date_naive();
        let intervals = self.resolver.resolve(local_date).await?;

        if !is_within_business_hours(start, end, local_date, &intervals, self.clinic_offset) {
            info!(
                "Rejecting {} - {}: outside the {} open interval(s) on {}",
                start,
                end,
                intervals.len(),
                local_date
            );
            return Err(SchedulingError::OutOfHours { start, end });
        }

        debug!("Appointment {} - {} is valid", start, end);
        Ok(())
    }
}

/// True iff some interval, anchored on `date` in the clinic's offset,
/// contains `[start, end)` entirely.
pub fn is_within_business_hours(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    date: NaiveDate,
    intervals: &[BusinessHourInterval],
    clinic_offset: FixedOffset,
) -> bool {
    intervals.iter().any(|interval| {
        let open = clinic_offset.from_local_datetime(&date.and_time(interval.start)).single();
        let close = clinic_offset.from_local_datetime(&date.and_time(interval.end)).single();

        match (open, close) {
            (Some(open), Some(close)) => open <= start && end <= close,
            _ => false,
        }
    })
}
