//! Wall-clock helpers. Times of day travel as zero-padded `HH:MM` strings and
//! carry no time zone; the relational store hands them back as `HH:MM:SS`.
//! Every time of day is a whole minute.

use chrono::{Datelike, NaiveDate, NaiveTime, ParseError, Timelike};
use thiserror::Error;

pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";
const TIME_OF_DAY_WITH_SECONDS: &str = "%H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeOfDayError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("times of day must fall on a whole minute")]
    NotWholeMinute,
}

/// Accepts `HH:MM`, or `HH:MM:SS` when the seconds are zero.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, TimeOfDayError> {
    let value = value.trim();
    let time = NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, TIME_OF_DAY_WITH_SECONDS))?;

    if !is_whole_minute(time) {
        return Err(TimeOfDayError::NotWholeMinute);
    }
    Ok(time)
}

pub fn is_whole_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_OF_DAY_FORMAT).to_string()
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_time_of_day(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw)
            .map_err(|e| de::Error::custom(format!("invalid time of day '{}': {}", raw, e)))
    }
}

pub mod option_hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => serializer.serialize_some(&super::format_time_of_day(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_time_of_day(&raw)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid time of day '{}': {}", raw, e))),
            _ => Ok(None),
        }
    }
}
