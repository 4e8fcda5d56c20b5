//! Health tracking for the monitor loop
//!
//! Records sensor and storage failures, notification delivery results and
//! upload failures so that a degraded monitor is visible in the log. A
//! sensor failure episode and a storage fault are each reported once when
//! they start and once when they recover, not on every sample.

use crate::alerts::AlertState;
use crate::events::Timestamp;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time health snapshot, logged as the heartbeat payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub generated_at: Timestamp,
    pub uptime_seconds: u64,
    pub last_reading_at: Option<Timestamp>,
    pub consecutive_sensor_failures: u32,
    pub sensor_faulted: bool,
    pub storage_faulted: bool,
    pub last_successful_log_write: Option<Timestamp>,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub upload_failures: u64,
    pub alert_state: AlertState,
}

/// Running health counters of one monitor
#[derive(Debug)]
pub struct MonitorHealth {
    started: Instant,
    /// Consecutive failed reads before a sensor failure is reported
    max_sensor_failures: u32,
    consecutive_sensor_failures: u32,
    sensor_faulted: bool,
    last_reading_at: Option<Timestamp>,
    storage_faulted: bool,
    last_successful_log_write: Option<Timestamp>,
    notifications_sent: u64,
    notifications_failed: u64,
    /// Shared with uploaders that fail after `upload` has returned
    upload_failures: Arc<AtomicU64>,
}

impl MonitorHealth {
    pub fn new(max_sensor_failures: u32) -> Self {
        Self {
            started: Instant::now(),
            max_sensor_failures: max_sensor_failures.max(1),
            consecutive_sensor_failures: 0,
            sensor_faulted: false,
            last_reading_at: None,
            storage_faulted: false,
            last_successful_log_write: None,
            notifications_sent: 0,
            notifications_failed: 0,
            upload_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count upload failures in `counter` from now on
    pub fn share_upload_failures(&mut self, counter: Arc<AtomicU64>) {
        self.upload_failures = counter;
    }

    /// Record a failed sensor read
    ///
    /// # Returns
    ///
    /// `true` if this failure starts a new sensor fault episode
    pub fn record_sensor_failure(&mut self) -> bool {
        self.consecutive_sensor_failures = self.consecutive_sensor_failures.saturating_add(1);

        if !self.sensor_faulted && self.consecutive_sensor_failures >= self.max_sensor_failures {
            self.sensor_faulted = true;
            error!(
                "Sensor failure detected: {} consecutive failed reads",
                self.consecutive_sensor_failures
            );
            return true;
        }
        false
    }

    pub fn record_sensor_success(&mut self, at: Timestamp) {
        if self.sensor_faulted {
            info!(
                "Sensor recovered after {} failed reads",
                self.consecutive_sensor_failures
            );
        }
        self.sensor_faulted = false;
        self.consecutive_sensor_failures = 0;
        self.last_reading_at = Some(at);
    }

    pub fn record_log_write_success(&mut self, at: Timestamp) {
        if self.storage_faulted {
            info!("Monthly log writes recovered");
        }
        self.storage_faulted = false;
        self.last_successful_log_write = Some(at);
    }

    pub fn record_log_write_failure(&mut self) {
        if !self.storage_faulted {
            warn!("Monthly log entering faulted state");
        }
        self.storage_faulted = true;
    }

    pub fn record_notification(&mut self, delivered: bool) {
        if delivered {
            self.notifications_sent += 1;
        } else {
            self.notifications_failed += 1;
        }
    }

    pub fn record_upload_failure(&mut self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sensor_faulted(&self) -> bool {
        self.sensor_faulted
    }

    pub fn storage_faulted(&self) -> bool {
        self.storage_faulted
    }

    pub fn consecutive_sensor_failures(&self) -> u32 {
        self.consecutive_sensor_failures
    }

    pub fn report(&self, now: Timestamp, alert_state: AlertState) -> HealthReport {
        HealthReport {
            generated_at: now,
            uptime_seconds: self.started.elapsed().as_secs(),
            last_reading_at: self.last_reading_at,
            consecutive_sensor_failures: self.consecutive_sensor_failures,
            sensor_faulted: self.sensor_faulted,
            storage_faulted: self.storage_faulted,
            last_successful_log_write: self.last_successful_log_write,
            notifications_sent: self.notifications_sent,
            notifications_failed: self.notifications_failed,
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            alert_state,
        }
    }
}
