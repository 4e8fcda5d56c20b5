//! Remote dashboard upload
//!
//! Samples are pushed to a ThingSpeak channel. Uploads are fire-and-forget:
//! the request runs on a background tokio worker, so a slow or unreachable
//! dashboard never stalls the sampling loop. Failures detected on the worker
//! are logged and counted in a counter shared with the monitor's health.

use crate::error::UploadError;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

pub const THINGSPEAK_UPDATE_URL: &str = "https://api.thingspeak.com/update";

/// Pushes samples to a remote dashboard
#[cfg_attr(test, mockall::automock)]
pub trait DashboardUploader: Send {
    /// Queue one sample for upload. Errors only describe failures detected
    /// before the request left the process.
    fn upload(&self, temperature: f64, humidity: f64) -> Result<(), UploadError>;
}

/// Uploader used when no API key is configured; every upload is skipped
#[derive(Debug, Default)]
pub struct DisabledUploader;

impl DashboardUploader for DisabledUploader {
    fn upload(&self, _temperature: f64, _humidity: f64) -> Result<(), UploadError> {
        Err(UploadError::NotConfigured)
    }
}

/// ThingSpeak channel uploader
pub struct ThingSpeakUploader {
    client: Client,
    runtime: Runtime,
    endpoint: String,
    api_key: String,
    failures: Arc<AtomicU64>,
}

impl ThingSpeakUploader {
    /// Create an uploader for the channel identified by `api_key`
    ///
    /// Every failed upload increments `failures`, including those only
    /// detected after [`DashboardUploader::upload`] returned.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NotConfigured` for a blank key, or an HTTP/IO
    /// error if the client or its worker runtime cannot be built.
    pub fn new(
        api_key: String,
        endpoint: String,
        timeout: Duration,
        failures: Arc<AtomicU64>,
    ) -> Result<Self, UploadError> {
        if api_key.trim().is_empty() {
            return Err(UploadError::NotConfigured);
        }

        let client = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dashboard-upload")
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            runtime,
            endpoint,
            api_key,
            failures,
        })
    }
}

/// Interpret a ThingSpeak update response
///
/// ThingSpeak answers `200` with the new entry id, or with `0` when the
/// update was rejected (bad key, rate limit).
pub fn check_response(status: StatusCode, body: &str) -> Result<(), UploadError> {
    if status == StatusCode::OK && body.trim() != "0" {
        Ok(())
    } else {
        Err(UploadError::Rejected(format!("{}: {}", status, body.trim())))
    }
}

impl DashboardUploader for ThingSpeakUploader {
    fn upload(&self, temperature: f64, humidity: f64) -> Result<(), UploadError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("api_key", self.api_key.clone()),
            ("field1", temperature.to_string()),
            ("field2", humidity.to_string()),
        ]);

        let failures = Arc::clone(&self.failures);
        self.runtime.spawn(async move {
            let result = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) => check_response(status, &body),
                        Err(e) => Err(UploadError::HttpError(e)),
                    }
                }
                Err(e) => Err(UploadError::HttpError(e)),
            };

            match result {
                Ok(()) => debug!("Data sent to ThingSpeak"),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!("ThingSpeak upload failed: {}", e);
                }
            }
        });

        Ok(())
    }
}
