//! Trend bar period definitions.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Duration unit of a trend bar.
///
/// Boundaries are aligned to the Unix epoch in UTC, so a minute bar always
/// starts at second zero and a daily bar at midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    /// 1-minute bars.
    #[serde(rename = "m1")]
    Minute1,
    /// 1-hour bars.
    #[serde(rename = "h1")]
    Hour1,
    /// Daily bars.
    #[serde(rename = "d1")]
    Day1,
}

impl Period {
    /// Returns the duration in seconds.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        match self {
            Self::Minute1 => 60,
            Self::Hour1 => 3600,
            Self::Day1 => 86400,
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub const fn milliseconds(&self) -> i64 {
        self.seconds() as i64 * 1000
    }

    /// Returns the duration as a chrono delta.
    #[must_use]
    pub fn delta(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.milliseconds())
    }

    /// Returns the duration as a std duration, for timers.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds())
    }

    /// Returns the start of the period containing `instant`.
    #[must_use]
    pub fn start_of(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let millis = instant.timestamp_millis();
        let start = millis.div_euclid(self.milliseconds()) * self.milliseconds();
        DateTime::from_timestamp_millis(start).unwrap_or(instant)
    }

    /// Returns the start of the period following the one containing `instant`.
    #[must_use]
    pub fn next_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(instant) + self.delta()
    }

    /// Returns the time left until the next period boundary.
    ///
    /// When `instant` sits exactly on a boundary this is a full period.
    #[must_use]
    pub fn delay_until_next(&self, instant: DateTime<Utc>) -> Duration {
        (self.next_start(instant) - instant)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Returns the period as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "m1",
            Self::Hour1 => "h1",
            Self::Day1 => "d1",
        }
    }

    /// Returns all available periods.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Minute1, Self::Hour1, Self::Day1]
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m1" | "1m" | "minute" | "minute1" => Ok(Self::Minute1),
            "h1" | "1h" | "hour" | "hour1" => Ok(Self::Hour1),
            "d1" | "1d" | "day" | "day1" | "daily" => Ok(Self::Day1),
            _ => Err(PeriodParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid period string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodParseError(String);

impl std::fmt::Display for PeriodParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid period '{}', expected one of: m1, h1, d1",
            self.0
        )
    }
}

impl std::error::Error for PeriodParseError {}
