//! Scroll-free detection of sticky elements becoming pinned.
//!
//! Each tracked element is bracketed by two invisible sentinels. A
//! [`ViewportProvider`] owns one pair of host visibility observers per scroll
//! root; the [`DualBoundaryController`] turns their change batches into
//! stuck/unstuck signals routed by owner id through the provider's
//! [`ObservationRegistry`] to the matching [`TrackedElement`].
//!
//! The host platform is reached only through the traits in [`host`]; the
//! [`host::headless`] implementation drives the engine without a browser.

pub mod audit;
pub mod controller;
pub mod element;
pub mod error;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod sentinel;

pub use audit::{LifecycleAudit, LifecycleEvent, LifecycleStage, NullLifecycleAudit, RecordingAudit};
pub use controller::{
    BOTTOM_THRESHOLDS, Boundary, BoundaryDecision, BoundaryRouter, DualBoundaryController,
    ObserverPair, TOP_THRESHOLDS, classify_bottom, classify_top,
};
pub use element::{StuckState, TrackedElement, TrackedElementConfig};
pub use error::{Result, StickyError};
pub use geometry::ClientRect;
pub use host::headless::{HeadlessHost, HeadlessNode, HeadlessObserver};
pub use host::{BatchCallback, ChangeRecord, Host, ObserverOptions, TaggedNode, VisibilityObserver};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{DetectionMetrics, MetricSnapshot};
pub use provider::{ProviderConfig, ProviderHandle, ViewportProvider};
pub use registry::{ObservationRegistry, OwnerId, StuckCallback};
pub use sentinel::{
    LOCATION_ATTR, Length, OWNER_ATTR, Sentinel, SentinelGeometry, SentinelLocation, SentinelPair,
    SentinelStyle,
};
