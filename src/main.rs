use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use pitherm::alerts::{LogNotifier, Notifier, WebhookNotifier};
use pitherm::clock::{Clock, SystemClock};
use pitherm::config::Config;
use pitherm::dashboard::{DashboardUploader, DisabledUploader, ThingSpeakUploader};
use pitherm::error::{ConfigError, UploadError};
use pitherm::hardware::{SensorDriver, SimulatedSensor};
use pitherm::monitor::Monitor;
use pitherm::scheduler::{
    LogReportTransport, ReportDispatcher, ReportScheduler, ReportTransport, WebhookReportTransport,
};
use pitherm::storage::LogStore;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Command-line arguments for the PiTherm monitor
#[derive(Parser)]
#[command(
    name = "pitherm",
    about = "PiTherm - server room temperature and humidity monitor",
    long_about = "Samples a temperature/humidity sensor, keeps monthly CSV logs, raises \
                  high/low temperature alerts with hysteresis, uploads readings to a \
                  dashboard and sends the previous month's log as a monthly report."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Temperature reported by the simulated sensor
    #[arg(long, value_name = "CELSIUS", default_value_t = 24.0)]
    simulate_temperature: f64,

    /// Humidity reported by the simulated sensor
    #[arg(long, value_name = "PERCENT", default_value_t = 50.0)]
    simulate_humidity: f64,
}

impl Cli {
    /// Reject a config path that is a directory and out-of-range simulated values
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files are allowed; load_config falls back to defaults
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!("{} is not a file", config_path.display()));
                }

                if config_path.extension() != Some(OsStr::new("toml")) {
                    warn!("Expected a .toml config file, got {}", config_path.display());
                }
            }
        }

        if !self.simulate_temperature.is_finite() {
            return Err("Simulated temperature must be a finite number".to_string());
        }
        if !(0.0..=100.0).contains(&self.simulate_humidity) {
            return Err(format!(
                "Simulated humidity must be between 0 and 100, got {}",
                self.simulate_humidity
            ));
        }

        Ok(())
    }

    /// The `--config` path as UTF-8, if one was given
    fn config_path_str(&self) -> Result<Option<&str>, String> {
        match &self.config {
            Some(path) => path
                .to_str()
                .map(Some)
                .ok_or_else(|| format!("Config path is not valid UTF-8: {}", path.display())),
            None => Ok(None),
        }
    }
}

/// Main application struct wiring the monitor loop and report scheduler
///
/// The monitor loop runs on the calling thread; the report scheduler runs
/// on its own thread. Both share the log store.
pub struct PiTherm {
    /// Sampling loop, run on the main thread
    monitor: Monitor,

    /// Background archival and monthly report thread
    report_scheduler: ReportScheduler,

    /// Shutdown signal for the monitor loop
    shutdown_sender: Sender<()>,
    shutdown_receiver: Receiver<()>,
}

impl PiTherm {
    /// Create a new PiTherm instance from validated configuration
    ///
    /// # Errors
    ///
    /// Fails if the thresholds are invalid or an HTTP client cannot be built.
    pub fn new(config: Config, sensor: Box<dyn SensorDriver>) -> anyhow::Result<Self> {
        info!("Initializing PiTherm with configuration");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(LogStore::new(
            config.storage.log_dir.clone(),
            Arc::clone(&clock),
        ));
        info!("Logging readings under {}", store.root().display());

        let notifier: Box<dyn Notifier> = match &config.notifications.webhook_url {
            Some(url) => {
                info!("Alert notifications go to webhook {}", url);
                Box::new(
                    WebhookNotifier::new(
                        url.clone(),
                        Duration::from_secs(config.notifications.timeout_seconds),
                    )
                    .context("Failed to create alert webhook client")?,
                )
            }
            None => {
                info!("No notification webhook configured, alerts are only logged");
                Box::new(LogNotifier)
            }
        };

        let upload_failures = Arc::new(AtomicU64::new(0));
        let uploader = Self::build_uploader(&config, Arc::clone(&upload_failures))?;

        let transport: Box<dyn ReportTransport> = match &config.report.webhook_url {
            Some(url) => {
                info!("Monthly reports go to webhook {}", url);
                Box::new(
                    WebhookReportTransport::new(
                        url.clone(),
                        Duration::from_secs(config.report.timeout_seconds),
                    )
                    .context("Failed to create report webhook client")?,
                )
            }
            None => {
                info!("No report webhook configured, monthly reports are only logged");
                Box::new(LogReportTransport)
            }
        };

        let dispatcher = ReportDispatcher::new(
            config.report_schedule(),
            Arc::clone(&store),
            transport,
            Arc::clone(&clock),
        );
        let report_scheduler = ReportScheduler::new(dispatcher, config.report_check_interval());

        let monitor = Monitor::new(
            config.monitor_settings(),
            config.alert_thresholds()?,
            sensor,
            notifier,
            uploader,
            store,
            clock,
        )
        .with_upload_failures(upload_failures);

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();

        Ok(PiTherm {
            monitor,
            report_scheduler,
            shutdown_sender,
            shutdown_receiver,
        })
    }

    fn build_uploader(
        config: &Config,
        failures: Arc<AtomicU64>,
    ) -> anyhow::Result<Box<dyn DashboardUploader>> {
        let Some(api_key) = config.dashboard.api_key.clone() else {
            warn!("THINGSPEAK_API_KEY is not set, dashboard uploads are disabled");
            return Ok(Box::new(DisabledUploader));
        };

        match ThingSpeakUploader::new(
            api_key,
            config.dashboard.endpoint.clone(),
            Duration::from_secs(config.dashboard.timeout_seconds),
            failures,
        ) {
            Ok(uploader) => Ok(Box::new(uploader)),
            Err(UploadError::NotConfigured) => {
                warn!("Dashboard API key is blank, dashboard uploads are disabled");
                Ok(Box::new(DisabledUploader))
            }
            Err(e) => Err(e).context("Failed to create dashboard client"),
        }
    }

    /// Load configuration from file or use defaults
    ///
    /// A missing or unreadable file falls back to defaults with a warning.
    /// A file that parses but fails validation is an error. Environment
    /// overrides are applied in both cases.
    pub fn load_config(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let mut config = match config_path {
            Some(path) => {
                info!("Loading configuration from: {}", path);
                match Config::from_file(std::path::Path::new(path)) {
                    Ok(config) => config,
                    Err(ConfigError::ReadError(e)) => {
                        warn!(
                            "Configuration file '{}' not found or unreadable ({}), using defaults",
                            path, e
                        );
                        Config::default()
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Start the background report scheduler
    pub fn start(&mut self) -> anyhow::Result<()> {
        info!("Starting PiTherm components");
        self.report_scheduler
            .start()
            .context("Failed to start report scheduler")?;
        Ok(())
    }

    pub fn shutdown_sender(&self) -> Sender<()> {
        self.shutdown_sender.clone()
    }

    /// Run the monitor loop on the calling thread until shutdown is signalled
    pub fn run(&mut self) {
        self.monitor.run(&self.shutdown_receiver);
    }

    /// Stop the report scheduler and wait for its thread
    pub fn stop(&mut self) {
        info!("Stopping PiTherm");
        self.report_scheduler.stop();
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting PiTherm environmental monitor");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config_path = match cli.config_path_str() {
        Ok(path) => path,
        Err(e) => {
            error!("Invalid configuration path: {}", e);
            std::process::exit(1);
        }
    };

    let config = match PiTherm::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let sensor = Box::new(SimulatedSensor::new(
        cli.simulate_temperature,
        cli.simulate_humidity,
    ));

    let mut app = match PiTherm::new(config, sensor) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize PiTherm: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.start() {
        error!("{:#}", e);
        std::process::exit(1);
    }

    let shutdown_sender = app.shutdown_sender();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }) {
        error!("Failed to install interrupt handler: {}", e);
        app.stop();
        std::process::exit(1);
    }

    info!("PiTherm is running. Press Ctrl+C to stop.");

    app.run();
    app.stop();

    info!("PiTherm shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(config: Option<PathBuf>) -> Cli {
        Cli {
            config,
            verbose: false,
            simulate_temperature: 24.0,
            simulate_humidity: 50.0,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[thresholds]\nhigh = 26.0").unwrap();

        assert!(cli(Some(file.path().to_path_buf())).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let cli = cli(Some(PathBuf::from("/nonexistent/pitherm.toml")));

        // Missing files fall back to defaults
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cli(Some(dir.path().to_path_buf())).validate().is_err());
    }

    #[test]
    fn test_cli_validation_no_config() {
        assert!(cli(None).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_rejects_bad_simulation_values() {
        let mut bad = cli(None);
        bad.simulate_humidity = 120.0;
        assert!(bad.validate().is_err());

        let mut bad = cli(None);
        bad.simulate_temperature = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_path_str_with_valid_path() {
        let cli = cli(Some(PathBuf::from("pitherm.toml")));
        assert_eq!(cli.config_path_str().unwrap(), Some("pitherm.toml"));
    }

    #[test]
    fn test_config_path_str_no_config() {
        assert_eq!(cli(None).config_path_str().unwrap(), None);
    }

    #[test]
    fn test_cli_parses_simulation_flags() {
        let cli = Cli::parse_from([
            "pitherm",
            "--config",
            "pitherm.toml",
            "--simulate-temperature",
            "26.5",
            "--simulate-humidity",
            "40",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("pitherm.toml")));
        assert_eq!(cli.simulate_temperature, 26.5);
        assert_eq!(cli.simulate_humidity, 40.0);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = PiTherm::load_config(Some("/nonexistent/pitherm.toml")).unwrap();
        assert_eq!(config.thresholds, Config::default().thresholds);
    }

    #[test]
    fn test_load_config_invalid_file_is_fatal() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[report]\nhour = 30").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let result = PiTherm::load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_app_wires_components_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.log_dir = dir.path().join("logs");

        let mut app = PiTherm::new(config, Box::new(SimulatedSensor::default())).unwrap();
        app.start().unwrap();

        app.shutdown_sender().send(()).unwrap();
        app.run();
        app.stop();

        assert!(dir.path().join("logs").join("current").is_dir());
    }
}
