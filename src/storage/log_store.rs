use crate::clock::Clock;
use crate::error::StorageError;
use crate::events::Reading;
use crate::storage::PeriodKey;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

/// Header row written once at the top of every monthly log
const HEADER: [&str; 4] = ["Date", "Time", "Temperature", "Humidity"];

/// One persisted row of a monthly log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// `YYYY-MM-DD`
    #[serde(rename = "Date")]
    pub date: String,
    /// `HH:MM:SS`
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
}

impl LogEntry {
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            date: reading.timestamp.format("%Y-%m-%d").to_string(),
            time: reading.timestamp.format("%H:%M:%S").to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
        }
    }
}

/// Outcome of one archival sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Periods moved from `current/` to `archive/`
    pub moved: Vec<PeriodKey>,
    /// Stale periods left in `current/` because `archive/` already had that file
    pub conflicts: Vec<PeriodKey>,
}

/// Append-only store of monthly CSV logs with a current/archive split
///
/// Layout under the root directory:
///
/// ```text
/// <root>/current/temp_log_YYYY-MM.csv   active period
/// <root>/archive/temp_log_YYYY-MM.csv   closed-out periods
/// ```
///
/// Every operation that touches either directory holds the store's lock,
/// so the monitor loop and the report scheduler never interleave a sweep,
/// an append or a report read. The store is shared between threads as
/// `Arc<LogStore>`.
pub struct LogStore {
    root: PathBuf,
    current_dir: PathBuf,
    archive_dir: PathBuf,
    clock: Arc<dyn Clock>,
    /// Guards the current/archive directory pair
    lock: Mutex<()>,
}

impl LogStore {
    /// Create a store rooted at `root`. Directories are created lazily on first use.
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let root = root.into();
        Self {
            current_dir: root.join("current"),
            archive_dir: root.join("archive"),
            root,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Append one reading to the log of the period it was taken in
    ///
    /// Runs the archival sweep first, then creates the period's file with a
    /// header row if it does not exist yet, appends the row and syncs it to
    /// disk. The row is serialized in full before the single write so a
    /// concurrent reader never sees half a line.
    ///
    /// # Returns
    ///
    /// Path of the file the row was appended to
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directories cannot be created or the
    /// file cannot be written. A failed sweep is only logged.
    pub fn append(&self, reading: &Reading) -> Result<PathBuf, StorageError> {
        let period = PeriodKey::from_timestamp(&reading.timestamp);

        let _guard = self.lock();
        self.ensure_layout()?;

        if let Err(e) = self.sweep(period) {
            warn!("Archival sweep before append failed: {}", e);
        }

        let path = self.current_dir.join(period.file_name());
        let is_new = match fs::metadata(&path) {
            Ok(metadata) => metadata.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.serialize(LogEntry::from_reading(reading))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| StorageError::IoError(e.into_error()))?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        if is_new {
            info!("Created monthly log {}", path.display());
        }
        debug!(
            "Logged {:.1}C / {:.1}% to {}",
            reading.temperature,
            reading.humidity,
            path.display()
        );

        Ok(path)
    }

    /// Move every log of a period earlier than the current one into `archive/`
    ///
    /// A file whose name already exists in `archive/` is left in `current/`
    /// and reported as a conflict; archived files are never overwritten.
    pub fn archive_stale_files(&self) -> Result<ArchiveSummary, StorageError> {
        let current = PeriodKey::from_timestamp(&self.clock.now());

        let _guard = self.lock();
        self.ensure_layout()?;
        self.sweep(current)
    }

    /// Reload every row of a period's log
    ///
    /// A period with no file yields an empty list rather than an error.
    pub fn read_entries(&self, period: PeriodKey) -> Result<Vec<LogEntry>, StorageError> {
        let _guard = self.lock();

        let Some(path) = self.locate(period) else {
            debug!("No log file for {}, treating as empty", period);
            return Ok(Vec::new());
        };

        let mut reader = csv::Reader::from_path(&path)?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<LogEntry>, csv::Error>>()?;
        Ok(entries)
    }

    /// Copy a period's log into a private snapshot file
    ///
    /// The lock is held only for the copy, so slow consumers of the snapshot
    /// (report delivery) never stall appends. The archived copy is preferred
    /// over `current/`. The snapshot lives under the store root, outside
    /// both log directories, and is deleted when dropped.
    ///
    /// # Returns
    ///
    /// `None` if the period has no file in either directory
    pub fn snapshot_period(&self, period: PeriodKey) -> Result<Option<NamedTempFile>, StorageError> {
        let _guard = self.lock();

        let Some(path) = self.locate(period) else {
            return Ok(None);
        };

        let mut source = File::open(&path)?;
        let mut snapshot = tempfile::Builder::new()
            .prefix(".report-")
            .suffix(&format!("-{}", period.file_name()))
            .tempfile_in(&self.root)?;
        io::copy(&mut source, &mut snapshot)?;
        snapshot.as_file().sync_data()?;

        debug!("Snapshot of {} taken at {}", path.display(), snapshot.path().display());
        Ok(Some(snapshot))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The mutex guards the filesystem, not in-memory data, so a panic
        // in another holder leaves nothing to repair.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_layout(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.current_dir)?;
        fs::create_dir_all(&self.archive_dir)?;
        Ok(())
    }

    fn locate(&self, period: PeriodKey) -> Option<PathBuf> {
        let name = period.file_name();
        [self.archive_dir.join(&name), self.current_dir.join(&name)]
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Caller must hold the lock.
    fn sweep(&self, current: PeriodKey) -> Result<ArchiveSummary, StorageError> {
        let mut summary = ArchiveSummary::default();

        for entry in fs::read_dir(&self.current_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(period) = PeriodKey::from_file_name(name) else {
                debug!("Ignoring unrecognised file in current log dir: {}", name);
                continue;
            };
            if period >= current {
                continue;
            }

            let target = self.archive_dir.join(name);
            if target.exists() {
                warn!(
                    "Archive already contains {}, leaving {} in place",
                    name,
                    entry.path().display()
                );
                summary.conflicts.push(period);
                continue;
            }

            fs::rename(entry.path(), &target)?;
            info!("Archived {} log to {}", period, target.display());
            summary.moved.push(period);
        }

        summary.moved.sort();
        summary.conflicts.sort();
        Ok(summary)
    }
}
