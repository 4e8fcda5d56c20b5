use thiserror::Error;

/// Errors that can occur when reading the sensor or driving actuators
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur in the monthly log store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid period key: {0}")]
    InvalidPeriod(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when delivering alert notifications
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to deliver notification: {0}")]
    DeliveryFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when uploading samples to the dashboard
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Dashboard upload not configured")]
    NotConfigured,

    #[error("Dashboard rejected upload: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur while dispatching a monthly report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report transport failed: {0}")]
    TransportFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
