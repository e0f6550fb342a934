use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::json;

use crate::error::{Result, StickyError};
use crate::host::Host;
use crate::logging::{ELEMENT_TARGET, LogLevel, emit, json_kv};
use crate::provider::ProviderHandle;
use crate::registry::{OwnerId, StuckCallback};
use crate::sentinel::{Sentinel, SentinelGeometry, SentinelLocation, SentinelPair, SentinelStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StuckState {
    #[default]
    Unstuck,
    Stuck,
}

impl StuckState {
    pub fn is_stuck(self) -> bool {
        matches!(self, StuckState::Stuck)
    }

    /// Value of the `data-stuck` marker: absent when flowing, empty when
    /// pinned.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            StuckState::Unstuck => None,
            StuckState::Stuck => Some(""),
        }
    }
}

impl From<bool> for StuckState {
    fn from(stuck: bool) -> Self {
        if stuck { StuckState::Stuck } else { StuckState::Unstuck }
    }
}

#[derive(Clone)]
pub struct TrackedElementConfig {
    /// Caller supplied id; one is generated when absent.
    pub owner_id: Option<OwnerId>,
    /// Invoked with the new state on every transition.
    pub on_stuck: Option<StuckCallback>,
    pub geometry: SentinelGeometry,
    /// Run the one-time `position: sticky` check on mount.
    pub diagnostics: bool,
}

impl Default for TrackedElementConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            on_stuck: None,
            geometry: SentinelGeometry::default(),
            diagnostics: cfg!(debug_assertions),
        }
    }
}

impl TrackedElementConfig {
    pub fn new(geometry: SentinelGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn with_owner_id(mut self, id: impl Into<OwnerId>) -> Self {
        self.owner_id = Some(id.into());
        self
    }

    pub fn on_stuck(mut self, callback: impl Fn(bool) + 'static) -> Self {
        self.on_stuck = Some(Rc::new(callback));
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}

impl fmt::Debug for TrackedElementConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedElementConfig")
            .field("owner_id", &self.owner_id)
            .field("on_stuck", &self.on_stuck.is_some())
            .field("geometry", &self.geometry)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Supervises one sticky region: brackets it with sentinels, registers with
/// the provider and exposes the live stuck state.
///
/// Dropping a mounted element unmounts it.
pub struct TrackedElement<H: Host> {
    id: OwnerId,
    provider: ProviderHandle<H>,
    geometry: SentinelGeometry,
    on_stuck: Option<StuckCallback>,
    state: Rc<Cell<StuckState>>,
    sentinels: Option<SentinelPair<H::Node>>,
    diagnostics: bool,
    layout_checked: bool,
}

impl<H: Host> TrackedElement<H> {
    pub fn new(provider: ProviderHandle<H>, config: TrackedElementConfig) -> Self {
        Self {
            id: config.owner_id.unwrap_or_else(OwnerId::generate),
            provider,
            geometry: config.geometry,
            on_stuck: config.on_stuck,
            state: Rc::new(Cell::new(StuckState::Unstuck)),
            sentinels: None,
            diagnostics: config.diagnostics,
            layout_checked: false,
        }
    }

    /// Bracket `region` with both sentinels, register the stuck callback and
    /// attach the sentinels to the provider's observers (now, or as soon as
    /// its root resolves).
    pub fn mount(&mut self, region: &H::Node) -> Result<()> {
        if self.sentinels.is_some() {
            return Err(StickyError::AlreadyMounted(self.id.to_string()));
        }

        let sentinels = self.insert_sentinels(region)?;
        if !self.provider.register(self.id.clone(), self.stuck_callback()) {
            self.remove_sentinels(&sentinels);
            return Err(StickyError::DuplicateOwner(self.id.to_string()));
        }

        self.provider.attach(&self.id, sentinels.clone());
        self.sentinels = Some(sentinels);
        self.check_layout(region);

        emit(
            self.provider.logger(),
            LogLevel::Debug,
            ELEMENT_TARGET,
            "element_mounted",
            [
                json_kv("owner", self.id.as_str()),
                json_kv("observing", json!(self.provider.is_ready())),
            ],
        );
        Ok(())
    }

    /// Unregister, stop observing and remove both sentinels. Returns `false`
    /// when the element was not mounted; calling it again is harmless.
    pub fn unmount(&mut self) -> bool {
        let Some(sentinels) = self.sentinels.take() else {
            return false;
        };

        self.provider.remove(&self.id);
        self.provider.detach(&self.id);
        self.remove_sentinels(&sentinels);
        self.state.set(StuckState::Unstuck);

        emit(
            self.provider.logger(),
            LogLevel::Debug,
            ELEMENT_TARGET,
            "element_unmounted",
            [json_kv("owner", self.id.as_str())],
        );
        true
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.id
    }

    pub fn state(&self) -> StuckState {
        self.state.get()
    }

    pub fn is_stuck(&self) -> bool {
        self.state.get().is_stuck()
    }

    pub fn stuck_marker(&self) -> Option<&'static str> {
        self.state.get().marker()
    }

    pub fn sentinels(&self) -> Option<&SentinelPair<H::Node>> {
        self.sentinels.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.sentinels.is_some()
    }

    fn insert_sentinels(&self, region: &H::Node) -> Result<SentinelPair<H::Node>> {
        let host = self.provider.host();
        let top = host.insert_sentinel(
            region,
            &Sentinel::top(self.id.clone()),
            &SentinelStyle::for_sentinel(SentinelLocation::Top, &self.geometry),
        )?;
        let bottom = host.insert_sentinel(
            region,
            &Sentinel::bottom(self.id.clone()),
            &SentinelStyle::for_sentinel(SentinelLocation::Bottom, &self.geometry),
        );
        match bottom {
            Ok(bottom) => Ok(SentinelPair { top, bottom }),
            Err(err) => {
                host.remove_sentinel(&top);
                Err(err)
            }
        }
    }

    fn remove_sentinels(&self, sentinels: &SentinelPair<H::Node>) {
        let host = self.provider.host();
        host.remove_sentinel(&sentinels.top);
        host.remove_sentinel(&sentinels.bottom);
    }

    /// Only transitions reach `on_stuck`; repeated signals are swallowed.
    fn stuck_callback(&self) -> StuckCallback {
        let state = Rc::clone(&self.state);
        let notify = self.on_stuck.clone();
        Rc::new(move |stuck: bool| {
            let next = StuckState::from(stuck);
            if state.get() == next {
                return;
            }
            state.set(next);
            if let Some(notify) = notify.as_ref() {
                notify(stuck);
            }
        })
    }

    fn check_layout(&mut self, region: &H::Node) {
        if !self.diagnostics || self.layout_checked {
            return;
        }
        self.layout_checked = true;

        let position = self.provider.host().computed_position(region);
        if position.as_deref() != Some("sticky") {
            emit(
                self.provider.logger(),
                LogLevel::Warn,
                ELEMENT_TARGET,
                "position_not_sticky",
                [
                    json_kv("owner", self.id.as_str()),
                    json_kv("position", json!(position)),
                ],
            );
        }
    }
}

impl<H: Host> Drop for TrackedElement<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<H: Host> fmt::Debug for TrackedElement<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedElement")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ClientRect;
    use crate::host::headless::{HeadlessHost, HeadlessNode};
    use crate::logging::{Logger, MemorySink};
    use crate::provider::{ProviderConfig, ViewportProvider};
    use std::cell::RefCell;

    type Seen = Rc<RefCell<Vec<bool>>>;

    struct Page {
        host: HeadlessHost,
        scroller: HeadlessNode,
        headers: Vec<HeadlessNode>,
    }

    /// Scroll container 100 tall holding 300-tall sections, each with a
    /// sticky 20-tall header at its top.
    fn page(sections: usize) -> Page {
        let host = HeadlessHost::new(400.0);
        let scroller = host.scroll_container(ClientRect::vertical(0.0, 100.0));
        let headers = (0..sections)
            .map(|index| {
                let section = host
                    .append_block(Some(&scroller), index as f64 * 300.0, 300.0)
                    .unwrap();
                let header = host.append_block(Some(&section), 0.0, 20.0).unwrap();
                host.set_position(&header, "sticky").unwrap();
                header
            })
            .collect();
        Page {
            host,
            scroller,
            headers,
        }
    }

    fn geometry() -> SentinelGeometry {
        SentinelGeometry::new("40px", "-24px", "96px")
    }

    fn tracked(provider: &ViewportProvider<HeadlessHost>, id: &str) -> (TrackedElement<HeadlessHost>, Seen) {
        let seen: Seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = TrackedElementConfig::new(geometry())
            .with_owner_id(id)
            .on_stuck(move |stuck| sink.borrow_mut().push(stuck));
        (TrackedElement::new(provider.handle(), config), seen)
    }

    fn scroll(page: &Page, y: f64) {
        page.host.scroll_to(Some(&page.scroller), y).unwrap();
        page.host.flush();
    }

    #[test]
    fn scrolling_pins_and_releases_each_section_independently() {
        let page = page(2);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        provider.resolve_root(page.scroller.clone());

        let (mut first, first_seen) = tracked(&provider, "first");
        let (mut second, second_seen) = tracked(&provider, "second");
        first.mount(&page.headers[0]).unwrap();
        second.mount(&page.headers[1]).unwrap();

        page.host.flush();
        assert!(first_seen.borrow().is_empty());
        assert!(second_seen.borrow().is_empty());

        // First top sentinel leaves the root.
        scroll(&page, 20.0);
        assert_eq!(*first_seen.borrow(), vec![true]);
        assert!(first.is_stuck());
        assert_eq!(first.stuck_marker(), Some(""));
        assert!(second_seen.borrow().is_empty());

        // First section's bottom sentinel is clipped by the root's top edge.
        scroll(&page, 250.0);
        assert_eq!(*first_seen.borrow(), vec![true, false]);
        assert_eq!(first.stuck_marker(), None);

        scroll(&page, 320.0);
        assert_eq!(*second_seen.borrow(), vec![true]);
        assert!(second.is_stuck());

        scroll(&page, 230.0);
        assert_eq!(*second_seen.borrow(), vec![true, false]);

        // First bottom sentinel fully exposed again.
        scroll(&page, 202.0);
        assert_eq!(*first_seen.borrow(), vec![true, false, true]);

        scroll(&page, 0.0);
        assert_eq!(*first_seen.borrow(), vec![true, false, true, false]);
        assert_eq!(*second_seen.borrow(), vec![true, false]);
        assert_eq!(first.state(), StuckState::Unstuck);
    }

    #[test]
    fn default_geometry_brackets_the_section_with_one_pixel_markers() {
        let page = page(1);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        provider.resolve_root(page.scroller.clone());

        let seen: Seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = TrackedElementConfig::default()
            .with_owner_id("plain")
            .on_stuck(move |stuck| sink.borrow_mut().push(stuck));
        let mut element = TrackedElement::new(provider.handle(), config);
        element.mount(&page.headers[0]).unwrap();
        page.host.flush();

        let sentinels = element.sentinels().unwrap().clone();
        assert_eq!(page.host.client_rect(&sentinels.top).unwrap(), ClientRect::vertical(0.0, 1.0));
        assert_eq!(
            page.host.client_rect(&sentinels.bottom).unwrap(),
            ClientRect::vertical(299.0, 300.0)
        );
        assert_eq!(element.stuck_marker(), None);

        scroll(&page, 10.0);
        assert_eq!(element.stuck_marker(), Some(""));

        // Bottom marker fully visible while pinned: no new notification.
        scroll(&page, 250.0);
        assert_eq!(*seen.borrow(), vec![true]);

        // Bottom marker clipped by the root top: the section is leaving.
        scroll(&page, 299.5);
        assert_eq!(*seen.borrow(), vec![true, false]);
        assert_eq!(element.stuck_marker(), None);
    }

    #[test]
    fn mounting_before_the_root_starts_observing_once_it_resolves() {
        let page = page(1);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        let (mut element, seen) = tracked(&provider, "late-root");
        element.mount(&page.headers[0]).unwrap();

        let sentinels = element.sentinels().cloned().unwrap();
        assert!(!page.host.is_observed(&sentinels.top));
        assert!(provider.registry().contains(element.owner_id()));

        provider.resolve_root(page.scroller.clone());
        assert!(page.host.is_observed(&sentinels.top));
        assert!(page.host.is_observed(&sentinels.bottom));

        scroll(&page, 20.0);
        assert_eq!(*seen.borrow(), vec![true]);
    }

    #[test]
    fn unmounting_before_the_root_resolves_leaves_nothing_behind() {
        let page = page(1);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        let (mut element, _) = tracked(&provider, "short-lived");
        element.mount(&page.headers[0]).unwrap();
        let sentinels = element.sentinels().cloned().unwrap();

        assert!(element.unmount());
        assert!(!element.unmount());
        assert!(provider.registry().is_empty());
        assert_eq!(provider.handle().attached_count(), 0);
        assert!(!page.host.is_attached(&sentinels.top));
        assert!(!page.host.is_attached(&sentinels.bottom));

        provider.resolve_root(page.scroller.clone());
        assert!(!page.host.is_observed(&sentinels.top));
        assert!(!page.host.is_observed(&sentinels.bottom));
    }

    #[test]
    fn dropping_a_mounted_element_cleans_up() {
        let page = page(1);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        provider.resolve_root(page.scroller.clone());

        let (mut element, _) = tracked(&provider, "dropped");
        element.mount(&page.headers[0]).unwrap();
        let sentinels = element.sentinels().cloned().unwrap();
        drop(element);

        assert!(provider.registry().is_empty());
        assert!(!page.host.is_observed(&sentinels.top));
        assert!(!page.host.is_observed(&sentinels.bottom));
        assert_eq!(page.host.pending_records(), 0);
    }

    #[test]
    fn duplicate_owner_is_rejected_without_side_effects() {
        let page = page(2);
        let mut provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        provider.resolve_root(page.scroller.clone());

        let (mut original, original_seen) = tracked(&provider, "shared-id");
        let (mut copy, copy_seen) = tracked(&provider, "shared-id");
        original.mount(&page.headers[0]).unwrap();

        let err = copy.mount(&page.headers[1]).unwrap_err();
        assert!(matches!(err, StickyError::DuplicateOwner(_)));
        assert!(!copy.is_mounted());
        assert_eq!(provider.handle().attached_count(), 1);

        // The failed element must not tear down the original on drop.
        drop(copy);
        scroll(&page, 20.0);
        assert_eq!(*original_seen.borrow(), vec![true]);
        assert!(copy_seen.borrow().is_empty());
    }

    #[test]
    fn second_mount_is_rejected() {
        let page = page(1);
        let provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        let (mut element, _) = tracked(&provider, "twice");
        element.mount(&page.headers[0]).unwrap();
        assert!(matches!(
            element.mount(&page.headers[0]),
            Err(StickyError::AlreadyMounted(_))
        ));
    }

    #[test]
    fn repeated_signals_do_not_renotify() {
        let page = page(1);
        let provider = ViewportProvider::new(page.host.clone(), ProviderConfig::default());
        let (mut element, seen) = tracked(&provider, "steady");
        element.mount(&page.headers[0]).unwrap();

        let registry = provider.registry();
        registry.dispatch(element.owner_id(), false);
        registry.dispatch(element.owner_id(), true);
        registry.dispatch(element.owner_id(), true);
        registry.dispatch(element.owner_id(), false);
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn generated_ids_tag_both_sentinels() {
        let page = page(1);
        let provider = ViewportProvider::new(page.host.clone(), ProviderConfig::ambient());
        let mut element = TrackedElement::new(provider.handle(), TrackedElementConfig::new(geometry()));
        element.mount(&page.headers[0]).unwrap();

        let sentinels = element.sentinels().unwrap();
        let top = Sentinel::from_node(&sentinels.top).unwrap();
        let bottom = Sentinel::from_node(&sentinels.bottom).unwrap();
        assert_eq!(&top.owner, element.owner_id());
        assert_eq!(&bottom.owner, element.owner_id());
        assert_eq!(top.location, SentinelLocation::Top);
        assert_eq!(bottom.location, SentinelLocation::Bottom);
    }

    #[test]
    fn non_sticky_region_warns_once() {
        let page = page(1);
        let plain = page.host.append_block(Some(&page.headers[0]), 0.0, 5.0).unwrap();
        let sink = MemorySink::new();
        let config = ProviderConfig::default().with_logger(Logger::new(sink.clone()));
        let provider = ViewportProvider::new(page.host.clone(), config);

        let mut element = TrackedElement::new(
            provider.handle(),
            TrackedElementConfig::new(geometry())
                .with_owner_id("plain")
                .with_diagnostics(true),
        );
        element.mount(&plain).unwrap();
        element.unmount();
        element.mount(&plain).unwrap();
        assert_eq!(sink.count("position_not_sticky"), 1);

        let mut sticky = TrackedElement::new(
            provider.handle(),
            TrackedElementConfig::new(geometry())
                .with_owner_id("sticky")
                .with_diagnostics(true),
        );
        sticky.mount(&page.headers[0]).unwrap();
        assert_eq!(sink.count("position_not_sticky"), 1);
    }
}
