//! Display formatting for millisecond timestamps and log cells.
//!
//! Output follows the Austrian short locale used on the dashboard:
//! `01.09.24` for dates and `14:05` for times.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Integers above this are treated as millisecond timestamps in log tables.
pub const LOG_TIMESTAMP_THRESHOLD: i64 = 10_000_000;

const DATE_FORMAT: &str = "%d.%m.%y";
const TIME_FORMAT: &str = "%H:%M";

/// Time zone timestamps are rendered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local zone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    fn render(self, utc: DateTime<Utc>, fmt: &str) -> String {
        match self {
            Self::Local => utc.with_timezone(&Local).format(fmt).to_string(),
            Self::Fixed(offset) => utc.with_timezone(&offset).format(fmt).to_string(),
        }
    }
}

/// Convert a millisecond UNIX timestamp.
///
/// # Errors
///
/// Returns `AppError::Parse` if the timestamp is outside chrono's range.
pub fn timestamp_to_utc(millis: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Parse(format!("timestamp {millis} out of range")))
}

/// # Errors
///
/// Returns `AppError::Parse` if the timestamp is outside chrono's range.
pub fn to_local_date(millis: i64, zone: DisplayZone) -> AppResult<String> {
    Ok(zone.render(timestamp_to_utc(millis)?, DATE_FORMAT))
}

/// # Errors
///
/// Returns `AppError::Parse` if the timestamp is outside chrono's range.
pub fn to_local_time(millis: i64, zone: DisplayZone) -> AppResult<String> {
    Ok(zone.render(timestamp_to_utc(millis)?, TIME_FORMAT))
}

/// `"<date>, <time>"`, e.g. `"01.09.24, 14:05"`.
///
/// # Errors
///
/// Returns `AppError::Parse` if the timestamp is outside chrono's range.
pub fn to_local_date_time(millis: i64, zone: DisplayZone) -> AppResult<String> {
    let utc = timestamp_to_utc(millis)?;
    Ok(format!(
        "{}, {}",
        zone.render(utc, DATE_FORMAT),
        zone.render(utc, TIME_FORMAT)
    ))
}

/// Render one cell of a log table.
///
/// Integral numbers above [`LOG_TIMESTAMP_THRESHOLD`] are shown as local
/// date-time; strings are shown without quotes and `null` as an empty cell.
#[must_use]
pub fn format_log_value(value: &Value, zone: DisplayZone) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match integral(n) {
            Some(i) if i > LOG_TIMESTAMP_THRESHOLD => {
                to_local_date_time(i, zone).unwrap_or_else(|_| n.to_string())
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if let Some(u) = n.as_u64() {
        return i64::try_from(u).ok();
    }
    n.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
        .map(|f| f as i64)
}
