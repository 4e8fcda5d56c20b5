//! Core reading and alert types for the environmental monitor
//!
//! This module defines the small value types that flow between the sensor,
//! the alert state machine and the log store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local wall-clock time. Period keys and report days follow the local calendar.
pub type Timestamp = NaiveDateTime;

/// A single temperature/humidity sample
///
/// Produced once per sampling iteration and consumed immediately; only the
/// persisted [`LogEntry`](crate::storage::LogEntry) outlives the iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// When the sample was taken
    pub timestamp: Timestamp,
}

impl Reading {
    pub fn new(temperature: f64, humidity: f64, timestamp: Timestamp) -> Self {
        Self {
            temperature,
            humidity,
            timestamp,
        }
    }
}

/// Which threshold an alert concerns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Temperature at or above the high threshold
    HighTemp,
    /// Temperature at or below the low threshold
    LowTemp,
}

impl AlertKind {
    /// Subject line used by notifiers
    pub fn subject(&self) -> &'static str {
        match self {
            AlertKind::HighTemp => "ALERT: High temperature",
            AlertKind::LowTemp => "ALERT: Low temperature",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::HighTemp => write!(f, "high"),
            AlertKind::LowTemp => write!(f, "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
    }

    #[test]
    fn test_reading_serialization() {
        let reading = Reading::new(23.4, 51.2, timestamp());

        let json = serde_json::to_string(&reading).unwrap();
        let deserialized: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(reading, deserialized);
    }

    #[test]
    fn test_alert_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&AlertKind::HighTemp).unwrap(),
            "\"high_temp\""
        );
        assert_eq!(
            serde_json::to_string(&AlertKind::LowTemp).unwrap(),
            "\"low_temp\""
        );
    }

    #[test]
    fn test_alert_kind_subject() {
        assert_eq!(AlertKind::HighTemp.subject(), "ALERT: High temperature");
        assert_eq!(AlertKind::LowTemp.subject(), "ALERT: Low temperature");
        assert_eq!(AlertKind::LowTemp.to_string(), "low");
    }
}
