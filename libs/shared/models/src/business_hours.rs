use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// An open time-of-day range on one calendar date. Several may apply to the
/// same date (morning and afternoon around a lunch break).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessHourInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl BusinessHourInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}
