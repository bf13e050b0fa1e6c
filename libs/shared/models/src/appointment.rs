use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest bookable appointment. Appointments never cross midnight, so
/// nothing valid is longer than a day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// `start + minutes`, or `None` when the result is not representable.
pub fn checked_end_time(start: DateTime<Utc>, duration_minutes: i64) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::try_minutes(duration_minutes)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl Appointment {
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        checked_end_time(self.start_time, self.duration_minutes)
    }

    /// Half-open overlap against `[start, end)`. A stored row whose end
    /// cannot be computed is treated as running indefinitely.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let own_end = self.end_time().unwrap_or(DateTime::<Utc>::MAX_UTC);
        intervals_overlap(self.start_time, own_end, start, end)
    }
}

/// A proposed appointment, checked before the create/update path persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCandidate {
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub exclude_appointment_id: Option<Uuid>,
}

impl AppointmentCandidate {
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        checked_end_time(self.start_time, self.duration_minutes)
    }

    pub fn has_identity(&self) -> bool {
        self.patient_id.is_some()
            || self
                .patient_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty())
    }
}

/// Reminder recipient resolved from an appointment's patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub patient_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
}

/// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
pub fn intervals_overlap<T: PartialOrd>(s1: T, e1: T, s2: T, e2: T) -> bool {
    s1 < e2 && s2 < e1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (at(10, 0), at(11, 0), at(10, 30), at(11, 30)),
            (at(10, 0), at(11, 0), at(11, 0), at(12, 0)),
            (at(9, 0), at(17, 0), at(12, 0), at(12, 30)),
            (at(8, 0), at(9, 0), at(10, 0), at(11, 0)),
        ];

        for (s1, e1, s2, e2) in cases {
            assert_eq!(
                intervals_overlap(s1, e1, s2, e2),
                intervals_overlap(s2, e2, s1, e1)
            );
            assert_eq!(intervals_overlap(s1, e1, s2, e2), s1 < e2 && s2 < e1);
        }
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(intervals_overlap(at(10, 0), at(11, 0), at(10, 59), at(12, 0)));
    }

    #[test]
    fn appointment_end_is_start_plus_duration() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: None,
            patient_name: Some("Walk-in".to_string()),
            start_time: at(10, 0),
            duration_minutes: 45,
        };
        assert_eq!(appointment.end_time(), Some(at(10, 45)));
        assert!(appointment.overlaps(at(10, 30), at(11, 0)));
        assert!(!appointment.overlaps(at(10, 45), at(11, 0)));
    }

    #[test]
    fn end_time_out_of_range_is_none() {
        assert_eq!(checked_end_time(at(10, 0), i64::MAX), None);
        assert_eq!(checked_end_time(at(10, 0), 9_000_000_000_000_000), None);
        assert_eq!(checked_end_time(DateTime::<Utc>::MAX_UTC, 1), None);
        assert_eq!(checked_end_time(at(10, 0), MAX_DURATION_MINUTES), Some(at(10, 0) + Duration::days(1)));
    }

    #[test]
    fn unrepresentable_stored_end_blocks_later_slots() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: None,
            patient_name: Some("Walk-in".to_string()),
            start_time: at(10, 0),
            duration_minutes: i64::MAX,
        };
        assert!(appointment.overlaps(at(16, 0), at(17, 0)));
        assert!(!appointment.overlaps(at(9, 0), at(10, 0)));
    }

    #[test]
    fn candidate_identity_requires_patient_or_name() {
        let mut candidate = AppointmentCandidate {
            patient_id: None,
            patient_name: Some("   ".to_string()),
            start_time: at(10, 0),
            duration_minutes: 30,
            exclude_appointment_id: None,
        };
        assert!(!candidate.has_identity());

        candidate.patient_name = Some("Ana".to_string());
        assert!(candidate.has_identity());
    }
}
