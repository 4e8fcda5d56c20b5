use crate::error::NotifyError;
use crate::events::AlertKind;
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Delivers threshold alerts to an operator
///
/// Implementations must not retry internally; the monitor records the
/// failure and moves on.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send {
    fn notify(&self, kind: AlertKind, temperature: f64, humidity: f64)
        -> Result<(), NotifyError>;
}

/// Format the plain-text body of an alert message
pub fn format_alert_body(temperature: f64, humidity: f64) -> String {
    format!(
        "Server Room Temperature Alert:\n\n\
         Temperature: {:.1}°C\n\
         Humidity: {:.1}%\n\n\
         - Raspberry Pi Temperature Monitor",
        temperature, humidity
    )
}

/// Notifier that only writes alerts to the application log
///
/// Used when no delivery channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        kind: AlertKind,
        temperature: f64,
        humidity: f64,
    ) -> Result<(), NotifyError> {
        warn!(
            "{} (temperature {:.1}°C, humidity {:.1}%)",
            kind.subject(),
            temperature,
            humidity
        );
        Ok(())
    }
}

/// JSON payload posted by [`WebhookNotifier`]
#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    kind: AlertKind,
    subject: &'a str,
    body: String,
    temperature: f64,
    humidity: f64,
}

/// Notifier that POSTs alerts as JSON to an HTTP endpoint
///
/// The monitor loop is synchronous, so the notifier owns a single-threaded
/// tokio runtime and blocks on each request up to the configured timeout.
pub struct WebhookNotifier {
    client: Client,
    runtime: Runtime,
    url: String,
}

impl WebhookNotifier {
    /// Create a webhook notifier
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint receiving the JSON alert payload
    /// * `timeout` - Upper bound for one delivery attempt
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the HTTP client or the runtime cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            runtime,
            url,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(
        &self,
        kind: AlertKind,
        temperature: f64,
        humidity: f64,
    ) -> Result<(), NotifyError> {
        let payload = AlertPayload {
            kind,
            subject: kind.subject(),
            body: format_alert_body(temperature, humidity),
            temperature,
            humidity,
        };

        let response = self.runtime.block_on(async {
            self.client.post(&self.url).json(&payload).send().await
        })?;

        if !response.status().is_success() {
            return Err(NotifyError::DeliveryFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        info!("Sent {} alert via webhook", kind);
        Ok(())
    }
}
