use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SharedStore, StoreError};
use shared_models::error::AppError;
use shared_models::time::{hhmm, option_hhmm};

// ==============================================================================
// ROUTER STATE
// ==============================================================================

#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
}

// ==============================================================================
// AVAILABILITY VERDICTS
// ==============================================================================

/// Why a (doctor, date, time) triple is or is not bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityReason {
    SlotAlreadyBooked,
    UnavailableOnDate,
    UnavailableAtTime,
    AvailableViaException,
    Available,
    OutsideSchedule,
}

impl AvailabilityReason {
    pub fn is_bookable(&self) -> bool {
        matches!(self, AvailabilityReason::Available | AvailabilityReason::AvailableViaException)
    }
}

impl fmt::Display for AvailabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityReason::SlotAlreadyBooked => write!(f, "slot already booked"),
            AvailabilityReason::UnavailableOnDate => write!(f, "doctor unavailable that date"),
            AvailabilityReason::UnavailableAtTime => write!(f, "doctor unavailable at that time"),
            AvailabilityReason::AvailableViaException => write!(f, "available via exception"),
            AvailabilityReason::Available => write!(f, "available"),
            AvailabilityReason::OutsideSchedule => write!(f, "doctor does not see patients at that time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub bookable: bool,
    pub reason: AvailabilityReason,
    pub message: String,
}

impl From<AvailabilityReason> for AvailabilityCheck {
    fn from(reason: AvailabilityReason) -> Self {
        Self {
            bookable: reason.is_bookable(),
            reason,
            message: reason.to_string(),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// One block of a submitted weekly schedule, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailabilityInput {
    pub day_of_week: i32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub interval_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceScheduleRequest {
    pub availability: Vec<WeeklyAvailabilityInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default, with = "option_hhmm")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm")]
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExceptionsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckQuery {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<String>,
    pub total_slots: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Availability exception {0} not found")]
    ExceptionNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::ExceptionNotFound(_) => AppError::NotFound(err.to_string()),
            ScheduleError::Store(store) => store.into(),
        }
    }
}
