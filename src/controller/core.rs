use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::host::{ChangeRecord, Host, ObserverOptions, TaggedNode, VisibilityObserver};
use crate::logging::{CONTROLLER_TARGET, LogLevel, Logger, emit, json_kv};
use crate::metrics::DetectionMetrics;
use crate::registry::ObservationRegistry;
use crate::sentinel::{Sentinel, SentinelPair};

/// Fires whenever the top sentinel crosses 0% visibility.
pub const TOP_THRESHOLDS: [f64; 1] = [0.0];
/// Fires whenever the bottom sentinel becomes (or stops being) fully visible.
pub const BOTTOM_THRESHOLDS: [f64; 1] = [1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Top,
    Bottom,
}

impl Boundary {
    pub fn as_str(self) -> &'static str {
        match self {
            Boundary::Top => "top",
            Boundary::Bottom => "bottom",
        }
    }

    pub fn thresholds(self) -> Vec<f64> {
        match self {
            Boundary::Top => TOP_THRESHOLDS.to_vec(),
            Boundary::Bottom => BOTTOM_THRESHOLDS.to_vec(),
        }
    }
}

/// What a single change record means for its tracked element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDecision {
    Stuck,
    Unstuck,
    NoChange,
    /// The root has not been measured yet; the record carries no signal.
    Unmeasured,
}

impl BoundaryDecision {
    pub fn stuck(self) -> Option<bool> {
        match self {
            BoundaryDecision::Stuck => Some(true),
            BoundaryDecision::Unstuck => Some(false),
            BoundaryDecision::NoChange | BoundaryDecision::Unmeasured => None,
        }
    }
}

/// Top sentinel rules: gone above the root means pinned, back inside the
/// root means flowing again, anything below the root is not a transition.
pub fn classify_top<N>(record: &ChangeRecord<N>) -> BoundaryDecision {
    let Some(root) = record.root_bounds else {
        return BoundaryDecision::Unmeasured;
    };
    let target = &record.bounding_rect;

    if target.bottom() < root.top {
        BoundaryDecision::Stuck
    } else if target.bottom() < root.bottom() {
        BoundaryDecision::Unstuck
    } else {
        BoundaryDecision::NoChange
    }
}

/// Bottom sentinel rules: fully exposed below the root's top edge means the
/// element is pinned; clipped by the root's top edge while ending inside the
/// root means the containing block is scrolling away and the element is not.
///
/// When a record satisfies both rules the release wins, so the element ends
/// up unstuck.
pub fn classify_bottom<N>(record: &ChangeRecord<N>) -> BoundaryDecision {
    let Some(root) = record.root_bounds else {
        return BoundaryDecision::Unmeasured;
    };
    let target = &record.bounding_rect;

    let pinned = target.bottom() > root.top && record.intersection_ratio == 1.0;
    let released = target.top < root.top && target.bottom() < root.bottom();

    if released {
        BoundaryDecision::Unstuck
    } else if pinned {
        BoundaryDecision::Stuck
    } else {
        BoundaryDecision::NoChange
    }
}

/// Routes classified records to the callbacks registered for their owner.
#[derive(Clone)]
pub struct BoundaryRouter {
    registry: ObservationRegistry,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<DetectionMetrics>>>,
}

impl BoundaryRouter {
    pub fn new(registry: ObservationRegistry) -> Self {
        Self {
            registry,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<Mutex<DetectionMetrics>>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Process one batch. Each dispatch looks the owner up afresh, so a
    /// callback that unregisters itself or another owner mid-batch is seen
    /// by the very next record.
    pub fn route<N: TaggedNode>(&self, boundary: Boundary, records: &[ChangeRecord<N>]) -> usize {
        self.with_metrics_guard(|metrics| metrics.record_batch(records.len()));

        let mut dispatched = 0;
        for record in records {
            let decision = match boundary {
                Boundary::Top => classify_top(record),
                Boundary::Bottom => classify_bottom(record),
            };

            let Some(sentinel) = Sentinel::from_node(&record.target) else {
                self.with_metrics_guard(DetectionMetrics::record_unrouted);
                continue;
            };

            let stuck = match decision {
                BoundaryDecision::Unmeasured => {
                    self.with_metrics_guard(DetectionMetrics::record_skipped_unmeasured);
                    continue;
                }
                other => match other.stuck() {
                    Some(stuck) => stuck,
                    None => continue,
                },
            };

            if self.registry.dispatch(&sentinel.owner, stuck) {
                dispatched += 1;
                self.with_metrics_guard(DetectionMetrics::record_dispatch);
            } else {
                self.with_metrics_guard(DetectionMetrics::record_unrouted);
            }
        }

        emit(
            self.logger.as_ref(),
            LogLevel::Debug,
            CONTROLLER_TARGET,
            "batch_processed",
            [
                json_kv("boundary", boundary.as_str()),
                json_kv("records", json!(records.len())),
                json_kv("dispatched", json!(dispatched)),
            ],
        );
        dispatched
    }

    fn with_metrics_guard(&self, apply: impl FnOnce(&mut DetectionMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                apply(&mut guard);
            }
        }
    }
}

/// The two watchers built for one scroll root.
pub struct ObserverPair<O> {
    pub top: O,
    pub bottom: O,
}

/// Owns the top and bottom watchers for one root and turns their batches
/// into stuck/unstuck dispatches.
pub struct DualBoundaryController<H: Host> {
    observers: ObserverPair<H::Observer>,
    root: Option<H::Node>,
}

impl<H: Host> DualBoundaryController<H> {
    /// Build both watchers scoped to `root` (`None` for the ambient viewport).
    pub fn new(host: &H, root: Option<H::Node>, router: BoundaryRouter) -> Self {
        let observers = ObserverPair {
            top: Self::watcher(host, root.clone(), Boundary::Top, router.clone()),
            bottom: Self::watcher(host, root.clone(), Boundary::Bottom, router),
        };
        Self { observers, root }
    }

    fn watcher(host: &H, root: Option<H::Node>, boundary: Boundary, router: BoundaryRouter) -> H::Observer {
        let options = ObserverOptions {
            root,
            thresholds: boundary.thresholds(),
        };
        host.create_observer(
            options,
            Rc::new(move |records: &[ChangeRecord<H::Node>]| {
                router.route(boundary, records);
            }),
        )
    }

    pub fn root(&self) -> Option<&H::Node> {
        self.root.as_ref()
    }

    pub fn observers(&self) -> &ObserverPair<H::Observer> {
        &self.observers
    }

    pub fn observe(&self, sentinels: &SentinelPair<H::Node>) {
        self.observers.top.observe(&sentinels.top);
        self.observers.bottom.observe(&sentinels.bottom);
    }

    pub fn unobserve(&self, sentinels: &SentinelPair<H::Node>) {
        self.observers.top.unobserve(&sentinels.top);
        self.observers.bottom.unobserve(&sentinels.bottom);
    }

    pub fn disconnect(&self) {
        self.observers.top.disconnect();
        self.observers.bottom.disconnect();
    }
}

impl<H: Host> fmt::Debug for DualBoundaryController<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualBoundaryController")
            .field("root", &self.root)
            .finish()
    }
}
