use crate::clock::Clock;
use crate::error::ReportError;
use crate::events::Timestamp;
use crate::scheduler::ReportTransport;
use crate::storage::{LogStore, PeriodKey};
use chrono::{Datelike, Timelike};
use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// File under the log root recording the last period a report was sent for
pub const REPORT_MARKER_FILE: &str = ".last_report";

/// When in the month the previous month's report goes out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSchedule {
    pub day_of_month: u32,
    /// Earliest local hour on `day_of_month` at which the report may be sent
    pub hour: u32,
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            day_of_month: 1,
            hour: 7,
        }
    }
}

impl ReportSchedule {
    pub fn is_due(&self, now: &Timestamp) -> bool {
        now.day() == self.day_of_month && now.hour() >= self.hour
    }
}

/// Reporting progress of this process
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    /// Period during which the last report was handled
    pub last_reported_period: Option<PeriodKey>,
}

/// What one scheduler wake did about the monthly report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Not the report day, or too early in the day
    NotDue,
    /// The report for the current period has already been handled
    AlreadyReported(PeriodKey),
    /// The given period's log was handed to the transport
    Dispatched(PeriodKey),
    /// The given period never had a log; nothing was sent
    MissingLog(PeriodKey),
}

/// Archives stale logs and sends each month's report exactly once
///
/// The "already reported" marker lives in memory and is mirrored to
/// [`REPORT_MARKER_FILE`] after a report is handled, so a restart on
/// report day does not send it again. A report whose transport failed is
/// only marked in memory; the next process start retries it.
pub struct ReportDispatcher {
    schedule: ReportSchedule,
    store: Arc<LogStore>,
    transport: Box<dyn ReportTransport>,
    clock: Arc<dyn Clock>,
    state: SchedulerState,
    marker_path: PathBuf,
}

impl ReportDispatcher {
    pub fn new(
        schedule: ReportSchedule,
        store: Arc<LogStore>,
        transport: Box<dyn ReportTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let marker_path = store.root().join(REPORT_MARKER_FILE);
        let state = SchedulerState {
            last_reported_period: Self::load_marker(&marker_path),
        };
        if let Some(period) = state.last_reported_period {
            info!("Last monthly report was handled during {}", period);
        }

        Self {
            schedule,
            store,
            transport,
            clock,
            state,
            marker_path,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// One scheduler tick: archival sweep, then the report check
    pub fn wake(&mut self) -> Result<ReportOutcome, ReportError> {
        match self.store.archive_stale_files() {
            Ok(summary) => {
                if !summary.moved.is_empty() {
                    info!("Archived {} stale monthly log(s)", summary.moved.len());
                }
            }
            Err(e) => warn!("Archival sweep failed: {}", e),
        }

        self.check_and_dispatch(self.clock.now())
    }

    /// Send the previous period's log if `now` is inside the report window
    /// and the current period has not been handled yet
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if the transport fails. The period is still
    /// marked as handled for this process.
    pub fn check_and_dispatch(&mut self, now: Timestamp) -> Result<ReportOutcome, ReportError> {
        let current = PeriodKey::from_timestamp(&now);

        if !self.schedule.is_due(&now) {
            return Ok(ReportOutcome::NotDue);
        }
        if self.state.last_reported_period == Some(current) {
            return Ok(ReportOutcome::AlreadyReported(current));
        }

        let target = current.previous();
        // The store lock is released once the snapshot exists; delivery
        // below runs without it.
        let snapshot = self.store.snapshot_period(target);

        self.state.last_reported_period = Some(current);

        let snapshot = match snapshot? {
            Some(snapshot) => snapshot,
            None => {
                warn!("No log file for {}, monthly report skipped", target);
                self.persist_marker(current);
                return Ok(ReportOutcome::MissingLog(target));
            }
        };

        let label = target.to_string();
        info!("Sending monthly report for {}", label);
        self.transport.send_report(snapshot.path(), &label)?;

        self.persist_marker(current);
        Ok(ReportOutcome::Dispatched(target))
    }

    fn load_marker(path: &Path) -> Option<PeriodKey> {
        match fs::read_to_string(path) {
            Ok(content) => match content.parse() {
                Ok(period) => Some(period),
                Err(e) => {
                    warn!("Ignoring unreadable report marker {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read report marker {}: {}", path.display(), e);
                None
            }
        }
    }

    fn persist_marker(&self, period: PeriodKey) {
        let result = self
            .marker_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.marker_path, period.to_string()));

        if let Err(e) = result {
            warn!(
                "Failed to persist report marker {}: {}",
                self.marker_path.display(),
                e
            );
        }
    }
}

/// Background thread driving a [`ReportDispatcher`] on a fixed interval
///
/// Independent of the monitor loop's cadence; the two only meet on the
/// log store's lock.
pub struct ReportScheduler {
    interval: Duration,
    dispatcher: Option<ReportDispatcher>,
    shutdown_sender: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReportScheduler {
    /// Create a scheduler that wakes every `interval`
    pub fn new(dispatcher: ReportDispatcher, interval: Duration) -> Self {
        Self {
            interval,
            dispatcher: Some(dispatcher),
            shutdown_sender: None,
            thread_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Spawn the scheduler thread. The first wake happens immediately.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::IoError` if the thread cannot be spawned.
    pub fn start(&mut self) -> Result<(), ReportError> {
        let Some(dispatcher) = self.dispatcher.take() else {
            info!("Report scheduler already started, skipping start");
            return Ok(());
        };

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("report-scheduler".to_string())
            .spawn(move || Self::scheduler_thread(dispatcher, interval, shutdown_receiver))?;

        self.shutdown_sender = Some(shutdown_sender);
        self.thread_handle = Some(handle);
        info!("Report scheduler started with interval: {:?}", self.interval);
        Ok(())
    }

    /// Signal the thread to stop and wait for it
    pub fn stop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            // A closed channel means the thread is already gone
            let _ = sender.send(());
        }

        if let Some(handle) = self.thread_handle.take() {
            debug!("Waiting for report scheduler thread to join");
            if handle.join().is_err() {
                error!("Report scheduler thread panicked");
            } else {
                info!("Report scheduler stopped");
            }
        }
    }

    fn scheduler_thread(
        mut dispatcher: ReportDispatcher,
        interval: Duration,
        shutdown: mpsc::Receiver<()>,
    ) {
        info!("Report scheduler thread started");

        loop {
            match dispatcher.wake() {
                Ok(ReportOutcome::Dispatched(period)) => {
                    info!("Monthly report for {} dispatched", period)
                }
                Ok(ReportOutcome::MissingLog(period)) => {
                    debug!("Monthly report for {} had no log to send", period)
                }
                Ok(outcome) => debug!("Report check: {:?}", outcome),
                Err(e) => error!("Failed to send monthly report: {}", e),
            }

            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("Report scheduler thread stopped");
    }
}
