use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, instrument, warn};

use shared_database::BusinessHoursStore;
use shared_models::BusinessHourInterval;

use crate::error::SchedulingError;

/// Resolves the open intervals for one calendar date. A date-specific
/// override replaces the weekly schedule for that date entirely, including
/// an override with no intervals, which closes the clinic.
pub struct BusinessHoursResolver {
    store: Arc<dyn BusinessHoursStore>,
}

impl BusinessHoursResolver {
    pub fn new(store: Arc<dyn BusinessHoursStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, date: NaiveDate) -> Result<Vec<BusinessHourInterval>, SchedulingError> {
        let intervals = match self.store.get_business_hours_override(date).await? {
            Some(overridden) => {
                debug!("Using {} override interval(s) for {}", overridden.len(), date);
                overridden
            }
            None => {
                let weekday = date.weekday().number_from_monday();
                self.store.get_weekly_business_hours(weekday).await?
            }
        };

        Ok(usable_intervals(date, intervals))
    }
}

fn usable_intervals(date: NaiveDate, intervals: Vec<BusinessHourInterval>) -> Vec<BusinessHourInterval> {
    let mut usable: Vec<BusinessHourInterval> = intervals
        .into_iter()
        .filter(|interval| {
            if !interval.is_valid() {
                warn!(
                    "Skipping business hour interval {}-{} on {}: start is not before end",
                    interval.start, interval.end, date
                );
            }
            interval.is_valid()
        })
        .collect();
    usable.sort_by_key(|interval| interval.start);
    usable
}
