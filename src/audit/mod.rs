//! Lifecycle audit hooks.
//!
//! Providers and tracked elements report their major transitions here so
//! callers can buffer or visualise how the engine progressed without hooking
//! into the dispatch path itself.

use std::cell::RefCell;
use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// A provider was constructed.
    ProviderCreated,
    /// An explicit scroll root was supplied (or replaced).
    RootResolved,
    /// A fresh observer pair was built for the current root.
    ObserversBuilt,
    /// The observer pair was disconnected and dropped.
    ObserversReleased,
    /// A tracked element registered and attached its sentinels.
    ElementAttached,
    /// A tracked element removed its registration and sentinels.
    ElementDetached,
}

#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub timestamp: SystemTime,
    pub stage: LifecycleStage,
    pub details: Vec<(String, Value)>,
}

impl LifecycleEvent {
    pub fn new(stage: LifecycleStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }
}

pub trait LifecycleAudit {
    fn record(&self, event: LifecycleEvent);
}

/// Used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullLifecycleAudit;

impl LifecycleAudit for NullLifecycleAudit {
    fn record(&self, _event: LifecycleEvent) {}
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: RefCell<Vec<LifecycleEvent>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<LifecycleStage> {
        self.events.borrow().iter().map(|event| event.stage).collect()
    }

    pub fn count(&self, stage: LifecycleStage) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.stage == stage)
            .count()
    }
}

impl LifecycleAudit for RecordingAudit {
    fn record(&self, event: LifecycleEvent) {
        self.events.borrow_mut().push(event);
    }
}
