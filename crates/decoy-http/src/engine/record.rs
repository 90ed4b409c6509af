//! Per-request records handed to an external log/recording collaborator.

use hyper::{Method, StatusCode};
use std::time::Duration;
use tracing::info;

use crate::model::ProjectMode;

/// Summary of one served request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Empty when no project matched the alias.
    pub project_id: String,
    pub alias: String,
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub mode: Option<ProjectMode>,
    pub matched: bool,
    pub latency: Duration,
}

impl RequestRecord {
    pub fn mode_label(&self) -> &str {
        self.mode.as_ref().map_or("none", ProjectMode::as_str)
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

/// Receives a record after each request. Implementations must not block.
pub trait RequestLogSink: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

/// Writes each record as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl RequestLogSink for TracingLogSink {
    fn record(&self, record: &RequestRecord) {
        info!(
            project = %record.project_id,
            mode = record.mode_label(),
            matched = record.matched,
            status = record.status.as_u16(),
            latency_ms = record.latency_ms(),
            "{} /{}{}",
            record.method,
            record.alias,
            record.path
        );
    }
}
