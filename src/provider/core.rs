use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::audit::{LifecycleAudit, LifecycleEvent, LifecycleStage, NullLifecycleAudit};
use crate::controller::{BoundaryRouter, DualBoundaryController};
use crate::host::Host;
use crate::logging::{LogLevel, Logger, PROVIDER_TARGET, emit, json_kv};
use crate::metrics::{DetectionMetrics, MetricSnapshot};
use crate::registry::{ObservationRegistry, OwnerId, StuckCallback};
use crate::sentinel::SentinelPair;

/// Configuration knobs for a [`ViewportProvider`].
#[derive(Clone)]
pub struct ProviderConfig {
    /// Observe against the host's top-level viewport instead of an explicit
    /// scroll container.
    pub use_ambient_viewport: bool,
    /// Optional structured logger shared with the controller and elements.
    pub logger: Option<Logger>,
    /// Counters shared with the controller.
    pub metrics: Option<Arc<Mutex<DetectionMetrics>>>,
    pub audit: Rc<dyn LifecycleAudit>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            use_ambient_viewport: false,
            logger: None,
            metrics: None,
            audit: Rc::new(NullLifecycleAudit),
        }
    }
}

impl ProviderConfig {
    pub fn ambient() -> Self {
        Self {
            use_ambient_viewport: true,
            ..Self::default()
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(mut self) -> Self {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(DetectionMetrics::new())));
        }
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<DetectionMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_audit(mut self, audit: Rc<dyn LifecycleAudit>) -> Self {
        self.audit = audit;
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("use_ambient_viewport", &self.use_ambient_viewport)
            .field("logger", &self.logger.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

struct ProviderShared<H: Host> {
    host: H,
    config: ProviderConfig,
    registry: ObservationRegistry,
    controller: RefCell<Option<Rc<DualBoundaryController<H>>>>,
    attached: RefCell<HashMap<OwnerId, SentinelPair<H::Node>>>,
}

impl<H: Host> ProviderShared<H> {
    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        emit(self.config.logger.as_ref(), level, PROVIDER_TARGET, message, fields);
    }

    fn audit(&self, event: LifecycleEvent) {
        self.config.audit.record(event);
    }

    fn record_metric(&self, apply: impl FnOnce(&mut DetectionMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                apply(&mut guard);
            }
        }
    }

    fn controller(&self) -> Option<Rc<DualBoundaryController<H>>> {
        self.controller.borrow().as_ref().map(Rc::clone)
    }

    /// Replace the current observer pair with one scoped to `root` and move
    /// every attached sentinel pair over to it.
    fn build_observers(&self, root: Option<H::Node>) {
        let router = BoundaryRouter::new(self.registry.clone())
            .with_logger(self.config.logger.clone())
            .with_metrics(self.config.metrics.clone());
        let controller = Rc::new(DualBoundaryController::new(&self.host, root, router));

        let previous = self.controller.replace(Some(Rc::clone(&controller)));
        let rebuilt = previous.is_some();
        if let Some(previous) = previous {
            previous.disconnect();
        }

        let pairs: Vec<_> = self.attached.borrow().values().cloned().collect();
        for pair in &pairs {
            controller.observe(pair);
        }

        self.record_metric(DetectionMetrics::record_observer_build);
        self.audit(
            LifecycleEvent::new(LifecycleStage::ObserversBuilt)
                .detail("rebuilt", rebuilt)
                .detail("tracked", pairs.len()),
        );
        self.log(
            LogLevel::Info,
            "observers_built",
            [
                json_kv("rebuilt", json!(rebuilt)),
                json_kv("tracked", json!(pairs.len())),
                json_kv("ambient", json!(self.config.use_ambient_viewport)),
            ],
        );
    }

    fn release_observers(&self) -> bool {
        let Some(previous) = self.controller.replace(None) else {
            return false;
        };
        previous.disconnect();
        self.audit(LifecycleEvent::new(LifecycleStage::ObserversReleased));
        self.log(LogLevel::Info, "observers_released", std::iter::empty());
        true
    }
}

/// Handle a provider gives to the tracked elements beneath it.
///
/// It exposes the registry and the current observer pair; elements never
/// build observers themselves.
pub struct ProviderHandle<H: Host> {
    shared: Rc<ProviderShared<H>>,
}

impl<H: Host> Clone for ProviderHandle<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<H: Host> ProviderHandle<H> {
    pub fn host(&self) -> &H {
        &self.shared.host
    }

    pub fn registry(&self) -> &ObservationRegistry {
        &self.shared.registry
    }

    pub fn register(&self, id: OwnerId, callback: StuckCallback) -> bool {
        self.shared.registry.register(id, callback)
    }

    pub fn remove(&self, id: &OwnerId) -> bool {
        self.shared.registry.remove(id)
    }

    /// The current observer pair, absent until the root resolves.
    pub fn observers(&self) -> Option<Rc<DualBoundaryController<H>>> {
        self.shared.controller()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.controller.borrow().is_some()
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.shared.config.logger.as_ref()
    }

    /// Remember `sentinels` for `id` and start observing them if the
    /// observers exist. Pairs attached earlier are picked up when the
    /// observers are (re)built.
    pub(crate) fn attach(&self, id: &OwnerId, sentinels: SentinelPair<H::Node>) {
        if let Some(controller) = self.shared.controller() {
            controller.observe(&sentinels);
        }
        self.shared.attached.borrow_mut().insert(id.clone(), sentinels);

        self.shared.record_metric(DetectionMetrics::record_attachment);
        self.shared.audit(
            LifecycleEvent::new(LifecycleStage::ElementAttached)
                .detail("owner", id.as_str())
                .detail("observing", self.is_ready()),
        );
    }

    /// Stop observing the pair attached for `id`. Returns it, or `None` when
    /// nothing was attached.
    pub(crate) fn detach(&self, id: &OwnerId) -> Option<SentinelPair<H::Node>> {
        let sentinels = self.shared.attached.borrow_mut().remove(id)?;
        if let Some(controller) = self.shared.controller() {
            controller.unobserve(&sentinels);
        }

        self.shared.record_metric(DetectionMetrics::record_detachment);
        self.shared
            .audit(LifecycleEvent::new(LifecycleStage::ElementDetached).detail("owner", id.as_str()));
        Some(sentinels)
    }

    pub fn attached_count(&self) -> usize {
        self.shared.attached.borrow().len()
    }

    pub fn is_attached(&self, id: &OwnerId) -> bool {
        self.shared.attached.borrow().contains_key(id)
    }
}

/// Owns the observer pair for one scroll region and publishes it, with the
/// registry, to tracked elements through [`ProviderHandle`].
pub struct ViewportProvider<H: Host> {
    handle: ProviderHandle<H>,
    root: Option<H::Node>,
}

impl<H: Host> ViewportProvider<H> {
    pub fn new(host: H, config: ProviderConfig) -> Self {
        let ambient = config.use_ambient_viewport;
        let shared = Rc::new(ProviderShared {
            host,
            config,
            registry: ObservationRegistry::new(),
            controller: RefCell::new(None),
            attached: RefCell::new(HashMap::new()),
        });
        shared.audit(LifecycleEvent::new(LifecycleStage::ProviderCreated).detail("ambient", ambient));

        if ambient {
            shared.build_observers(None);
        }

        Self {
            handle: ProviderHandle { shared },
            root: None,
        }
    }

    /// Supply the wrapped scroll container once it exists. Returns `true`
    /// when a new observer pair was built; the same root again is a no-op,
    /// and ambient-viewport providers ignore explicit roots.
    pub fn resolve_root(&mut self, root: H::Node) -> bool {
        let shared = &self.handle.shared;
        if shared.config.use_ambient_viewport {
            shared.log(LogLevel::Debug, "root_ignored", [json_kv("reason", "ambient_viewport")]);
            return false;
        }
        if self.root.as_ref() == Some(&root) {
            return false;
        }

        shared.audit(
            LifecycleEvent::new(LifecycleStage::RootResolved).detail("replaced", self.root.is_some()),
        );
        self.root = Some(root.clone());
        shared.build_observers(Some(root));
        true
    }

    /// Forget the current root and disconnect its observers. Attached
    /// sentinels stay remembered for the next root.
    pub fn release_root(&mut self) -> bool {
        if self.handle.shared.config.use_ambient_viewport {
            return false;
        }
        self.root = None;
        self.handle.shared.release_observers()
    }

    pub fn handle(&self) -> ProviderHandle<H> {
        self.handle.clone()
    }

    pub fn registry(&self) -> &ObservationRegistry {
        self.handle.registry()
    }

    pub fn observers(&self) -> Option<Rc<DualBoundaryController<H>>> {
        self.handle.observers()
    }

    pub fn root(&self) -> Option<&H::Node> {
        self.root.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_ready()
    }

    pub fn uses_ambient_viewport(&self) -> bool {
        self.handle.shared.config.use_ambient_viewport
    }

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.handle.shared.config.metrics.as_ref()?;
        metrics.lock().ok().map(|guard| guard.snapshot())
    }
}

impl<H: Host> Drop for ViewportProvider<H> {
    fn drop(&mut self) {
        self.handle.shared.release_observers();
    }
}
