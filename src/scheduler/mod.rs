/// Background archival and monthly report dispatch
pub mod report_scheduler;
pub mod transport;

pub use report_scheduler::{
    ReportDispatcher, ReportOutcome, ReportSchedule, ReportScheduler, SchedulerState,
};
pub use transport::{LogReportTransport, ReportTransport, WebhookReportTransport};
