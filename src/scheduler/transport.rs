use crate::error::ReportError;
use log::info;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Delivers a closed-out monthly log to its recipients
#[cfg_attr(test, mockall::automock)]
pub trait ReportTransport: Send {
    fn send_report(&self, file_path: &Path, period_label: &str) -> Result<(), ReportError>;
}

/// Subject line of the monthly report
pub fn report_subject(period_label: &str) -> String {
    format!("Monthly Temp Report - {}", period_label)
}

/// Transport that records the report in the application log only
#[derive(Debug, Default)]
pub struct LogReportTransport;

impl ReportTransport for LogReportTransport {
    fn send_report(&self, file_path: &Path, period_label: &str) -> Result<(), ReportError> {
        let size = fs::metadata(file_path)?.len();
        info!(
            "{}: {} ({} bytes)",
            report_subject(period_label),
            file_path.display(),
            size
        );
        Ok(())
    }
}

/// Transport that POSTs the CSV log to an HTTP endpoint
///
/// The period label and subject travel as `X-Report-Period` and
/// `X-Report-Subject` headers; the body is the raw CSV file.
pub struct WebhookReportTransport {
    client: Client,
    runtime: Runtime,
    url: String,
}

impl WebhookReportTransport {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ReportError> {
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

impl ReportTransport for WebhookReportTransport {
    fn send_report(&self, file_path: &Path, period_label: &str) -> Result<(), ReportError> {
        let body = fs::read(file_path)?;

        let response = self.runtime.block_on(async {
            self.client
                .post(&self.url)
                .header(CONTENT_TYPE, "text/csv")
                .header("X-Report-Period", period_label)
                .header("X-Report-Subject", report_subject(period_label))
                .body(body)
                .send()
                .await
        })?;
        if !response.status().is_success() {
            return Err(ReportError::TransportFailed(format!(
                "report webhook returned {}",
                response.status()
            )));
        }

        info!("Monthly report for {} sent via webhook", period_label);
        Ok(())
    }
}
