/// Error types for the environmental monitor
pub mod error;

/// Shared data types: readings, timestamps and alert kinds
pub mod events;

/// Wall-clock abstraction
pub mod clock;

/// Configuration management
pub mod config;

/// Hysteresis alert state machine and notifications
pub mod alerts;

/// Monthly CSV log store
pub mod storage;

/// Background archival and monthly report dispatch
pub mod scheduler;

/// Sensor and actuator drivers
pub mod hardware;

/// Cloud dashboard uploads
pub mod dashboard;

/// Sampling loop and health tracking
pub mod monitor;

// Re-export commonly used types
pub use error::{ConfigError, NotifyError, ReportError, SensorError, StorageError, UploadError};

#[cfg(test)]
mod test_support;
