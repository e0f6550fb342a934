use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Counters accumulated by a provider and its controller.
#[derive(Debug, Default, Clone)]
pub struct DetectionMetrics {
    records: u64,
    dispatches: u64,
    skipped_unmeasured: u64,
    unrouted: u64,
    observer_builds: u64,
    attachments: u64,
    detachments: u64,
}

impl DetectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&mut self, records: usize) {
        self.records = self.records.saturating_add(records as u64);
    }

    pub fn record_dispatch(&mut self) {
        self.dispatches = self.dispatches.saturating_add(1);
    }

    pub fn record_skipped_unmeasured(&mut self) {
        self.skipped_unmeasured = self.skipped_unmeasured.saturating_add(1);
    }

    /// A record whose sentinel tag was missing or whose owner had no callback.
    pub fn record_unrouted(&mut self) {
        self.unrouted = self.unrouted.saturating_add(1);
    }

    pub fn record_observer_build(&mut self) {
        self.observer_builds = self.observer_builds.saturating_add(1);
    }

    pub fn record_attachment(&mut self) {
        self.attachments = self.attachments.saturating_add(1);
    }

    pub fn record_detachment(&mut self) {
        self.detachments = self.detachments.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            records: self.records,
            dispatches: self.dispatches,
            skipped_unmeasured: self.skipped_unmeasured,
            unrouted: self.unrouted,
            observer_builds: self.observer_builds,
            attachments: self.attachments,
            detachments: self.detachments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub records: u64,
    pub dispatches: u64,
    pub skipped_unmeasured: u64,
    pub unrouted: u64,
    pub observer_builds: u64,
    pub attachments: u64,
    pub detachments: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("records".to_string(), json!(self.records));
        map.insert("dispatches".to_string(), json!(self.dispatches));
        map.insert("skipped_unmeasured".to_string(), json!(self.skipped_unmeasured));
        map.insert("unrouted".to_string(), json!(self.unrouted));
        map.insert("observer_builds".to_string(), json!(self.observer_builds));
        map.insert("attachments".to_string(), json!(self.attachments));
        map.insert("detachments".to_string(), json!(self.detachments));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "detection_metrics", self.as_fields())
    }
}
