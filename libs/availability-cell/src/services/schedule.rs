use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::SharedStore;
use shared_models::scheduling::{
    AvailabilityException, DateRange, NewAvailabilityException, NewWeeklyAvailability,
    WeeklyAvailability, DEFAULT_SLOT_INTERVAL_MINUTES,
};
use shared_models::time::is_whole_minute;

use crate::models::{CreateExceptionRequest, ScheduleError, WeeklyAvailabilityInput};

pub const MAX_INTERVAL_MINUTES: i32 = 720;

pub struct ScheduleService {
    store: SharedStore,
}

impl ScheduleService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn weekly_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<WeeklyAvailability>, ScheduleError> {
        debug!("Fetching weekly schedule for doctor {}", doctor_id);
        Ok(self.store.list_weekly_availability(doctor_id).await?)
    }

    /// Replaces the doctor's whole weekly schedule.
    ///
    /// Every entry is validated first; a single bad entry rejects the request
    /// and leaves the current schedule untouched.
    pub async fn replace_weekly_schedule(
        &self,
        doctor_id: Uuid,
        entries: Vec<WeeklyAvailabilityInput>,
    ) -> Result<Vec<WeeklyAvailability>, ScheduleError> {
        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| validate_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, rule) in rules.iter().enumerate() {
            if let Some(other) = rules[i + 1..].iter().find(|other| rule.overlaps(other)) {
                warn!(
                    "Doctor {} schedule has overlapping blocks on weekday {}: {}-{} and {}-{}",
                    doctor_id,
                    rule.day_of_week,
                    rule.start_time,
                    rule.end_time,
                    other.start_time,
                    other.end_time
                );
            }
        }

        let saved = self
            .store
            .replace_weekly_availability(doctor_id, rules)
            .await?;

        info!("Replaced weekly schedule for doctor {} with {} blocks", doctor_id, saved.len());
        Ok(saved)
    }

    pub async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<AvailabilityException>, ScheduleError> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(ScheduleError::Validation(format!(
                    "from ({}) must not be after to ({})",
                    from, to
                )));
            }
        }

        debug!("Listing exceptions for doctor {} in {:?}", doctor_id, range);
        Ok(self.store.list_exceptions(doctor_id, range).await?)
    }

    pub async fn create_exception(
        &self,
        doctor_id: Uuid,
        request: CreateExceptionRequest,
    ) -> Result<AvailabilityException, ScheduleError> {
        match (request.start_time, request.end_time) {
            (Some(start), Some(end)) if start >= end => {
                return Err(ScheduleError::Validation(
                    "start_time must be before end_time".to_string(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ScheduleError::Validation(
                    "start_time and end_time must be given together".to_string(),
                ));
            }
            _ => {}
        }
        if !request.start_time.into_iter().chain(request.end_time).all(is_whole_minute) {
            return Err(ScheduleError::Validation(
                "times must fall on a whole minute".to_string(),
            ));
        }

        let reason = request
            .reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());

        let exception = self
            .store
            .insert_exception(NewAvailabilityException {
                doctor_id,
                date: request.date,
                is_available: request.is_available,
                start_time: request.start_time,
                end_time: request.end_time,
                reason,
            })
            .await?;

        info!(
            "Created {:?} exception {} for doctor {} on {}",
            exception.kind(),
            exception.id,
            doctor_id,
            exception.date
        );
        Ok(exception)
    }

    pub async fn get_exception(
        &self,
        exception_id: Uuid,
    ) -> Result<AvailabilityException, ScheduleError> {
        self.store
            .get_exception(exception_id)
            .await?
            .ok_or(ScheduleError::ExceptionNotFound(exception_id))
    }

    pub async fn delete_exception(&self, exception_id: Uuid) -> Result<(), ScheduleError> {
        if !self.store.delete_exception(exception_id).await? {
            return Err(ScheduleError::ExceptionNotFound(exception_id));
        }

        info!("Deleted availability exception {}", exception_id);
        Ok(())
    }
}

fn validate_entry(
    index: usize,
    entry: &WeeklyAvailabilityInput,
) -> Result<NewWeeklyAvailability, ScheduleError> {
    let invalid = |msg: String| ScheduleError::Validation(format!("entry {}: {}", index, msg));

    let day_of_week = u8::try_from(entry.day_of_week)
        .ok()
        .filter(|day| *day <= 6)
        .ok_or_else(|| {
            invalid(format!(
                "day_of_week must be between 0 (Sunday) and 6 (Saturday), got {}",
                entry.day_of_week
            ))
        })?;

    if entry.start_time >= entry.end_time {
        return Err(invalid("start_time must be before end_time".to_string()));
    }
    if !is_whole_minute(entry.start_time) || !is_whole_minute(entry.end_time) {
        return Err(invalid("times must fall on a whole minute".to_string()));
    }

    let interval_minutes = entry.interval_minutes.unwrap_or(DEFAULT_SLOT_INTERVAL_MINUTES);
    if !(1..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
        return Err(invalid(format!(
            "interval_minutes must be between 1 and {}, got {}",
            MAX_INTERVAL_MINUTES, interval_minutes
        )));
    }

    Ok(NewWeeklyAvailability {
        day_of_week,
        start_time: entry.start_time,
        end_time: entry.end_time,
        interval_minutes,
    })
}
