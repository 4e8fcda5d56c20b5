/// Sampling loop, log write rate limiting and health tracking
pub mod health;
pub mod monitor_loop;
pub mod rate_limiter;

pub use health::{HealthReport, MonitorHealth};
pub use monitor_loop::{Monitor, MonitorSettings, TickOutcome};
pub use rate_limiter::LogRateLimiter;
