use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::TimeUnit;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FxPipeResult};

/// A `strftime`-style timestamp pattern used to parse textual timestamps.
///
/// Patterns are accepted in the common `%Y-%m-%d %H:%M:%S.%f` form. A literal
/// `.%f` is rewritten to chrono's `%.f`, which also accepts values that carry
/// no fractional part at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TimestampFormat {
    pattern: String,
}

impl TimestampFormat {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern: String = pattern.into();
        Self {
            pattern: pattern.replace(".%f", "%.f"),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses `value`, falling back to midnight for date-only patterns.
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        NaiveDateTime::parse_from_str(value, &self.pattern)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value, &self.pattern)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    }

    /// Like [`parse`](Self::parse) but fails with a configuration error.
    ///
    /// Used for timestamps that come from settings rather than from data.
    pub fn parse_setting(&self, value: &str) -> FxPipeResult<NaiveDateTime> {
        self.parse(value).ok_or_else(|| {
            ConfigError::InvalidTimestamp {
                value: value.to_string(),
                format: self.pattern.clone(),
            }
            .into()
        })
    }
}

impl From<String> for TimestampFormat {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<TimestampFormat> for String {
    fn from(value: TimestampFormat) -> Self {
        value.pattern
    }
}

pub(crate) fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

pub(crate) fn from_physical(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
    };
    dt.map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn test_fractional_pattern_accepts_whole_seconds() {
        let fmt = TimestampFormat::new("%Y-%m-%d %H:%M:%S.%f");
        assert_eq!(fmt.pattern(), "%Y-%m-%d %H:%M:%S%.f");

        let whole = fmt.parse("2021-11-20 10:00:00").expect("whole seconds");
        assert_eq!(whole.hour(), 10);

        let fractional = fmt.parse("2021-11-20 10:00:00.250").expect("fractional");
        assert_eq!(fractional.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_date_only_pattern_falls_back_to_midnight() {
        let fmt = TimestampFormat::new("%Y-%m-%d");
        let ts = fmt.parse("2021-11-20").expect("date only");
        assert_eq!(ts.hour(), 0);
        assert_eq!(ts.minute(), 0);
    }

    #[test]
    fn test_invalid_setting_is_config_error() {
        let fmt = TimestampFormat::new("%Y-%m-%d %H:%M:%S");
        let err = fmt.parse_setting("20/11/2021").unwrap_err();
        assert!(err.to_string().contains("20/11/2021"));
    }

    #[test]
    fn test_physical_round_trip() {
        let ts = TimestampFormat::new("%Y-%m-%d %H:%M:%S")
            .parse("2021-11-20 10:00:00")
            .expect("valid timestamp");
        let micros = to_micros(ts);
        assert_eq!(from_physical(micros, TimeUnit::Microseconds), Some(ts));
        assert_eq!(from_physical(micros / 1000, TimeUnit::Milliseconds), Some(ts));
        assert_eq!(from_physical(micros * 1000, TimeUnit::Nanoseconds), Some(ts));
    }
}
