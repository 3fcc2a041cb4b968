use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A requested start timestamp, with or without timezone information.
///
/// Timestamps lacking an offset are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StartDate {
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl StartDate {
    /// Converts to the canonical UTC representation.
    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            StartDate::Naive(naive) => naive.and_utc(),
            StartDate::Zoned(zoned) => zoned.with_timezone(&Utc),
        }
    }
}

impl From<DateTime<Utc>> for StartDate {
    fn from(value: DateTime<Utc>) -> Self {
        StartDate::Zoned(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for StartDate {
    fn from(value: NaiveDateTime) -> Self {
        StartDate::Naive(value)
    }
}

impl FromStr for StartDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(zoned) => Ok(StartDate::Zoned(zoned)),
            Err(_) => NaiveDateTime::from_str(s)
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .map(StartDate::Naive),
        }
    }
}

impl TryFrom<String> for StartDate {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

impl From<StartDate> for String {
    fn from(value: StartDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StartDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartDate::Naive(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S")),
            StartDate::Zoned(zoned) => write!(f, "{}", zoned.to_rfc3339()),
        }
    }
}

/// Half-open interval `[start, end)` occupied by a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    /// True when the two windows share at least one instant.
    ///
    /// A window ending exactly when the other starts does not overlap it.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}
