use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use availability_cell::AvailabilityReason;
use shared_config::AppConfig;
use shared_database::{SharedStore, StoreError};
use shared_models::error::AppError;
use shared_models::scheduling::{AppointmentFilter, AppointmentStatus};
use shared_models::time::hhmm;

use crate::services::SlotLocks;

// ==============================================================================
// ROUTER STATE
// ==============================================================================

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub locks: Arc<SlotLocks>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Ignored for patients, who always book for themselves.
    pub patient_id: Option<Uuid>,
    pub service_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQueryParams {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl From<AppointmentQueryParams> for AppointmentFilter {
    fn from(params: AppointmentQueryParams) -> Self {
        Self {
            doctor_id: params.doctor_id,
            patient_id: params.patient_id,
            date: params.date,
            status: params.status,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Unavailable(AvailabilityReason),

    #[error("slot just became unavailable, please retry")]
    SlotTaken,

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment is {0} and can no longer be changed")]
    Closed(AppointmentStatus),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Unavailable(_)
            | BookingError::InvalidStatusTransition { .. }
            | BookingError::Closed(_) => AppError::BadRequest(err.to_string()),
            BookingError::SlotTaken => AppError::Conflict(err.to_string()),
            BookingError::NotFound(_) | BookingError::DoctorNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            BookingError::Store(store) => store.into(),
        }
    }
}
