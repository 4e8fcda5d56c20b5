/// Monthly CSV log store with current/archive split
pub mod log_store;
pub mod period;

pub use log_store::{ArchiveSummary, LogEntry, LogStore};
pub use period::PeriodKey;
