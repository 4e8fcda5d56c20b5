pub mod settings;

pub use settings::{
    Config, DashboardConfig, HealthConfig, NotificationsConfig, ReportConfig, SamplingConfig,
    StorageConfig, ThresholdsConfig,
};
