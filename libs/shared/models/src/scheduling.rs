use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{hhmm, option_hhmm};

/// Step used when a rule does not specify one, and always for windowed overrides.
pub const DEFAULT_SLOT_INTERVAL_MINUTES: i32 = 30;

fn default_interval_minutes() -> i32 {
    DEFAULT_SLOT_INTERVAL_MINUTES
}

fn default_true() -> bool {
    true
}

// ==============================================================================
// WEEKLY AVAILABILITY
// ==============================================================================

/// A doctor's standing schedule block for one weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday .. 6 = Saturday
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl WeeklyAvailability {
    /// Half-open: the end time itself is not covered.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeeklyAvailability {
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i32,
}

impl NewWeeklyAvailability {
    pub fn overlaps(&self, other: &NewWeeklyAvailability) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

// ==============================================================================
// DATE EXCEPTIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "option_hhmm")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm")]
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// How an exception bears on its date once polarity and window are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    WholeDayBlackout,
    PartialBlackout { start: NaiveTime, end: NaiveTime },
    WholeDayOverride,
    PartialOverride { start: NaiveTime, end: NaiveTime },
    /// Only one bound stored; neither whole-day nor windowed.
    Incomplete { is_available: bool },
}

impl ExceptionKind {
    pub fn window_contains(&self, time: NaiveTime) -> bool {
        match *self {
            ExceptionKind::PartialBlackout { start, end }
            | ExceptionKind::PartialOverride { start, end } => start <= time && time < end,
            _ => false,
        }
    }
}

impl AvailabilityException {
    pub fn window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ExceptionKind {
        match (self.is_available, self.window()) {
            (false, Some((start, end))) => ExceptionKind::PartialBlackout { start, end },
            (true, Some((start, end))) => ExceptionKind::PartialOverride { start, end },
            (false, None) if self.start_time.is_none() => ExceptionKind::WholeDayBlackout,
            (true, None) if self.start_time.is_none() && self.end_time.is_none() => {
                ExceptionKind::WholeDayOverride
            }
            (is_available, None) => ExceptionKind::Incomplete { is_available },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAvailabilityException {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "option_hhmm")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm")]
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

/// Inclusive date bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Everything except a cancelled appointment holds its slot.
    pub fn occupies_slot(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.date.map_or(true, |date| appointment.date == date)
            && self.status.map_or(true, |status| appointment.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn exception(is_available: bool, start: Option<NaiveTime>, end: Option<NaiveTime>) -> AvailabilityException {
        AvailabilityException {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            is_available,
            start_time: start,
            end_time: end,
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_exceptions() {
        assert_eq!(exception(false, None, None).kind(), ExceptionKind::WholeDayBlackout);
        assert_eq!(exception(true, None, None).kind(), ExceptionKind::WholeDayOverride);
        assert_eq!(
            exception(false, Some(t(9, 0)), Some(t(10, 0))).kind(),
            ExceptionKind::PartialBlackout { start: t(9, 0), end: t(10, 0) }
        );
        assert_eq!(
            exception(true, Some(t(14, 0)), Some(t(15, 0))).kind(),
            ExceptionKind::PartialOverride { start: t(14, 0), end: t(15, 0) }
        );
        assert_eq!(
            exception(true, None, Some(t(15, 0))).kind(),
            ExceptionKind::Incomplete { is_available: true }
        );
    }

    #[test]
    fn exception_window_is_half_open() {
        let kind = exception(false, Some(t(9, 0)), Some(t(10, 0))).kind();
        assert!(kind.window_contains(t(9, 0)));
        assert!(kind.window_contains(t(9, 59)));
        assert!(!kind.window_contains(t(10, 0)));
        assert!(!ExceptionKind::WholeDayBlackout.window_contains(t(9, 0)));
    }

    #[test]
    fn deserializes_store_rows() {
        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "day_of_week": 1,
            "start_time": "08:00:00",
            "end_time": "10:00:00",
            "created_at": "2025-01-01T00:00:00+00:00"
        });
        let rule: WeeklyAvailability = serde_json::from_value(row).unwrap();
        assert_eq!(rule.interval_minutes, DEFAULT_SLOT_INTERVAL_MINUTES);
        assert!(rule.active);
        assert!(rule.contains(t(9, 30)));
        assert!(!rule.contains(t(10, 0)));

        let serialized = serde_json::to_value(&rule).unwrap();
        assert_eq!(serialized["start_time"], "08:00");
    }

    #[test]
    fn only_cancelled_releases_slot() {
        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Completed.occupies_slot());
        assert!(!AppointmentStatus::Cancelled.occupies_slot());
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let range = DateRange { from: Some(d(2)), to: Some(d(4)) };
        assert!(range.contains(d(2)));
        assert!(range.contains(d(4)));
        assert!(!range.contains(d(5)));
        assert!(DateRange::default().contains(d(31)));
    }
}
