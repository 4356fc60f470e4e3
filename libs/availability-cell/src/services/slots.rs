use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SharedStore, StoreError};
use shared_models::scheduling::{ExceptionKind, DEFAULT_SLOT_INTERVAL_MINUTES};
use shared_models::time::day_of_week;

pub struct SlotGenerator {
    store: SharedStore,
}

impl SlotGenerator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Free start times for a doctor on a date, ascending.
    ///
    /// A windowed override replaces the weekly rules for the day and is walked
    /// at the default interval. A windowed blackout removes the starts inside
    /// its window. Overlapping rules may yield the same start twice.
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, StoreError> {
        debug!("Generating slots for doctor {} on {}", doctor_id, date);

        let exception = self.store.find_exception(doctor_id, date).await?;
        let kind = exception.as_ref().map(|exc| exc.kind());

        match kind {
            Some(ExceptionKind::WholeDayBlackout) => {
                debug!("Doctor {} blacked out on {}", doctor_id, date);
                return Ok(Vec::new());
            }
            Some(ExceptionKind::Incomplete { is_available }) => {
                warn!(
                    "Exception for doctor {} on {} has a single bound (is_available={}), ignoring its window",
                    doctor_id, date, is_available
                );
            }
            _ => {}
        }

        let rules = self
            .store
            .find_weekly_availability(doctor_id, day_of_week(date))
            .await?;

        let has_override = exception.as_ref().is_some_and(|exc| exc.is_available);
        if rules.is_empty() && !has_override {
            debug!("No weekly rules for doctor {} on weekday {}", doctor_id, day_of_week(date));
            return Ok(Vec::new());
        }

        let occupied: HashSet<NaiveTime> = self
            .store
            .find_booked_appointments(doctor_id, date)
            .await?
            .into_iter()
            .map(|appointment| appointment.time)
            .collect();

        let mut slots = match kind {
            Some(ExceptionKind::PartialOverride { start, end }) => {
                expand_range(start, end, DEFAULT_SLOT_INTERVAL_MINUTES, &occupied)
            }
            _ => {
                let mut slots: Vec<NaiveTime> = rules
                    .iter()
                    .flat_map(|rule| {
                        expand_range(rule.start_time, rule.end_time, rule.interval_minutes, &occupied)
                    })
                    .collect();

                if let Some(blackout @ ExceptionKind::PartialBlackout { .. }) = kind {
                    slots.retain(|time| !blackout.window_contains(*time));
                }
                slots
            }
        };

        slots.sort();
        debug!("Generated {} free slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }
}

/// Walks `[start, end)` in `interval_minutes` steps, skipping occupied starts.
///
/// Never wraps past midnight. A non-positive interval yields nothing.
pub fn expand_range(
    start: NaiveTime,
    end: NaiveTime,
    interval_minutes: i32,
    occupied: &HashSet<NaiveTime>,
) -> Vec<NaiveTime> {
    let mut slots = Vec::new();

    if interval_minutes <= 0 {
        warn!("Skipping range {}-{} with interval {}", start, end, interval_minutes);
        return slots;
    }

    let step = Duration::minutes(i64::from(interval_minutes));
    let mut current = start;

    while current < end {
        if !occupied.contains(&current) {
            slots.push(current);
        }

        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn end_is_exclusive() {
        let slots = expand_range(t(8, 0), t(10, 0), 30, &HashSet::new());
        assert_eq!(slots, vec![t(8, 0), t(8, 30), t(9, 0), t(9, 30)]);
    }

    #[test]
    fn last_start_may_overrun_end() {
        let slots = expand_range(t(9, 0), t(10, 0), 45, &HashSet::new());
        assert_eq!(slots, vec![t(9, 0), t(9, 45)]);
    }

    #[test]
    fn occupied_starts_are_skipped() {
        let occupied = HashSet::from([t(8, 30)]);
        let slots = expand_range(t(8, 0), t(9, 30), 30, &occupied);
        assert_eq!(slots, vec![t(8, 0), t(9, 0)]);
    }

    #[test]
    fn empty_or_inverted_range_yields_nothing() {
        assert!(expand_range(t(9, 0), t(9, 0), 30, &HashSet::new()).is_empty());
        assert!(expand_range(t(10, 0), t(9, 0), 30, &HashSet::new()).is_empty());
    }

    #[test]
    fn non_positive_interval_yields_nothing() {
        assert!(expand_range(t(8, 0), t(10, 0), 0, &HashSet::new()).is_empty());
        assert!(expand_range(t(8, 0), t(10, 0), -15, &HashSet::new()).is_empty());
    }

    #[test]
    fn stops_at_midnight() {
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        let slots = expand_range(t(23, 0), end, 30, &HashSet::new());
        assert_eq!(slots, vec![t(23, 0), t(23, 30)]);
    }
}
