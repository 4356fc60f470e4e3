use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use shared_database::{SharedStore, StoreError};
use shared_models::scheduling::ExceptionKind;
use shared_models::time::day_of_week;

use crate::models::{AvailabilityCheck, AvailabilityReason};

pub struct AvailabilityChecker {
    store: SharedStore,
}

impl AvailabilityChecker {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Decides whether one start time can be booked.
    ///
    /// Precedence, first match wins: an existing booking, a whole-day blackout,
    /// a blackout window, an override window, the weekly rules, a whole-day
    /// override. Anything else is outside the schedule.
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<AvailabilityCheck, StoreError> {
        let reason = self.resolve(doctor_id, date, time).await?;
        debug!(
            "Availability for doctor {} on {} at {}: {:?}",
            doctor_id, date, time, reason
        );
        Ok(reason.into())
    }

    async fn resolve(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<AvailabilityReason, StoreError> {
        if self
            .store
            .find_booked_appointment(doctor_id, date, time)
            .await?
            .is_some()
        {
            return Ok(AvailabilityReason::SlotAlreadyBooked);
        }

        let kind = self
            .store
            .find_exception(doctor_id, date)
            .await?
            .map(|exc| exc.kind());

        match kind {
            Some(ExceptionKind::WholeDayBlackout) => {
                return Ok(AvailabilityReason::UnavailableOnDate)
            }
            Some(window @ ExceptionKind::PartialBlackout { .. }) if window.window_contains(time) => {
                return Ok(AvailabilityReason::UnavailableAtTime)
            }
            Some(window @ ExceptionKind::PartialOverride { .. }) if window.window_contains(time) => {
                return Ok(AvailabilityReason::AvailableViaException)
            }
            _ => {}
        }

        let rules = self
            .store
            .find_weekly_availability(doctor_id, day_of_week(date))
            .await?;

        if rules.iter().any(|rule| rule.active && rule.contains(time)) {
            return Ok(AvailabilityReason::Available);
        }

        if kind == Some(ExceptionKind::WholeDayOverride) {
            return Ok(AvailabilityReason::Available);
        }

        Ok(AvailabilityReason::OutsideSchedule)
    }
}
