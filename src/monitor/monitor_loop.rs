use crate::alerts::{transition, AlertState, AlertThresholds, AlertTransition, Notifier};
use crate::clock::Clock;
use crate::dashboard::DashboardUploader;
use crate::error::{SensorError, UploadError};
use crate::events::Reading;
use crate::hardware::SensorDriver;
use crate::monitor::{LogRateLimiter, MonitorHealth};
use crate::storage::LogStore;
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicU64;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timing knobs of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Delay between sensor reads
    pub sample_interval: Duration,
    /// Minimum spacing between monthly log writes
    pub log_interval: Duration,
    /// Consecutive failed reads before a sensor failure is reported
    pub max_consecutive_sensor_failures: u32,
    /// How often to log a health heartbeat, `None` to disable
    pub heartbeat_interval: Option<Duration>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(30),
            log_interval: Duration::from_secs(300),
            max_consecutive_sensor_failures: 5,
            heartbeat_interval: Some(Duration::from_secs(3600)),
        }
    }
}

/// Result of one sampling iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable reading; nothing else ran
    SensorUnavailable,
    /// Reading processed; `logged` tells whether a log write was attempted
    Processed { logged: bool },
}

/// The sampling loop: display, rate-limited logging, dashboard upload and
/// hysteresis alerts for every reading
///
/// Owns the alert latches; the report scheduler runs on its own thread and
/// only shares the [`LogStore`].
pub struct Monitor {
    settings: MonitorSettings,
    thresholds: AlertThresholds,
    alert_state: AlertState,
    sensor: Box<dyn SensorDriver>,
    notifier: Box<dyn Notifier>,
    uploader: Box<dyn DashboardUploader>,
    store: Arc<LogStore>,
    clock: Arc<dyn Clock>,
    log_limiter: LogRateLimiter,
    health: MonitorHealth,
    last_heartbeat: Instant,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        thresholds: AlertThresholds,
        sensor: Box<dyn SensorDriver>,
        notifier: Box<dyn Notifier>,
        uploader: Box<dyn DashboardUploader>,
        store: Arc<LogStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            log_limiter: LogRateLimiter::new(settings.log_interval),
            health: MonitorHealth::new(settings.max_consecutive_sensor_failures),
            settings,
            thresholds,
            alert_state: AlertState::default(),
            sensor,
            notifier,
            uploader,
            store,
            clock,
            last_heartbeat: Instant::now(),
        }
    }

    /// Count upload failures in `counter`, shared with an uploader that
    /// reports failures from its background worker
    pub fn with_upload_failures(mut self, counter: Arc<AtomicU64>) -> Self {
        self.health.share_upload_failures(counter);
        self
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert_state
    }

    pub fn health(&self) -> &MonitorHealth {
        &self.health
    }

    /// Sample until `shutdown` receives a message or its sender is dropped
    ///
    /// Shutdown is only observed between iterations. The sensor driver is
    /// shut down exactly once on the way out, also when an iteration panics;
    /// the panic is then resumed.
    pub fn run(&mut self, shutdown: &Receiver<()>) {
        info!(
            "Monitoring started (sample every {:?}, log every {:?})",
            self.settings.sample_interval, self.settings.log_interval
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_loop(shutdown)));

        self.sensor.shutdown();
        info!("Monitoring stopped");

        if let Err(payload) = result {
            panic::resume_unwind(payload);
        }
    }

    fn run_loop(&mut self, shutdown: &Receiver<()>) {
        loop {
            self.tick();
            self.maybe_heartbeat(Instant::now());

            match shutdown.recv_timeout(self.settings.sample_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) => {
                    info!("Shutdown requested");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown channel closed");
                    break;
                }
            }
        }
    }

    /// Run one sampling iteration
    pub fn tick(&mut self) -> TickOutcome {
        let sample = self.sensor.read_sample().and_then(|(temperature, humidity)| {
            if temperature.is_finite() && humidity.is_finite() {
                Ok((temperature, humidity))
            } else {
                Err(SensorError::Unavailable(format!(
                    "non-numeric sample ({temperature}, {humidity})"
                )))
            }
        });

        match sample {
            Ok((temperature, humidity)) => {
                let reading = Reading::new(temperature, humidity, self.clock.now());
                self.health.record_sensor_success(reading.timestamp);
                let logged = self.process_reading(reading);
                TickOutcome::Processed { logged }
            }
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                self.health.record_sensor_failure();
                TickOutcome::SensorUnavailable
            }
        }
    }

    /// Handle one valid reading
    ///
    /// # Returns
    ///
    /// `true` if a monthly log write was attempted for this reading
    pub fn process_reading(&mut self, reading: Reading) -> bool {
        self.process_reading_at(reading, Instant::now())
    }

    fn process_reading_at(&mut self, reading: Reading, now: Instant) -> bool {
        let Reading {
            temperature,
            humidity,
            ..
        } = reading;
        info!("Temp: {:.1}°C | Humidity: {:.1}%", temperature, humidity);

        if let Err(e) = self.sensor.render_display(temperature, humidity) {
            warn!("Failed to update display: {}", e);
        }

        let logged = self.log_limiter.can_write_at(now);
        if logged {
            // The window restarts even if this write fails
            self.log_limiter.record_attempt_at(now);
            match self.store.append(&reading) {
                Ok(_) => self.health.record_log_write_success(reading.timestamp),
                Err(e) => {
                    warn!("Failed to write reading to monthly log: {}", e);
                    self.health.record_log_write_failure();
                }
            }
        }

        match self.uploader.upload(temperature, humidity) {
            Ok(()) => {}
            Err(UploadError::NotConfigured) => debug!("Dashboard upload skipped: not configured"),
            Err(e) => {
                warn!("Dashboard upload failed: {}", e);
                self.health.record_upload_failure();
            }
        }

        let outcome = transition(&mut self.alert_state, &self.thresholds, temperature);
        for event in &outcome.transitions {
            match *event {
                AlertTransition::Fired(kind) => {
                    warn!("{} temperature alert triggered at {:.1}°C", kind, temperature);
                    match self.notifier.notify(kind, temperature, humidity) {
                        Ok(()) => self.health.record_notification(true),
                        Err(e) => {
                            warn!("Failed to deliver {} temperature alert: {}", kind, e);
                            self.health.record_notification(false);
                        }
                    }
                }
                AlertTransition::Cleared(kind) => {
                    info!("{} temperature alert cleared at {:.1}°C", kind, temperature);
                }
            }
        }

        if let Err(e) = self.sensor.set_indicator(outcome.indicator) {
            warn!("Failed to set indicator: {}", e);
        }

        logged
    }

    fn maybe_heartbeat(&mut self, now: Instant) {
        let Some(interval) = self.settings.heartbeat_interval else {
            return;
        };
        if now.saturating_duration_since(self.last_heartbeat) < interval {
            return;
        }
        self.last_heartbeat = now;

        let report = self.health.report(self.clock.now(), self.alert_state);
        match serde_json::to_string(&report) {
            Ok(json) => info!("Heartbeat: {}", json),
            Err(e) => warn!("Failed to serialize heartbeat: {}", e),
        }
    }
}
