//! Seams to the host platform: layout, visibility observation and the
//! sibling insertion used to bracket a region with sentinels.
//!
//! A browser binding implements [`Host`] over its DOM; [`headless`] ships a
//! layout-free implementation for tests and simulations.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::geometry::ClientRect;
use crate::sentinel::{Sentinel, SentinelStyle};

pub mod headless;

/// A host node that exposes string attributes.
pub trait TaggedNode {
    fn attribute(&self, name: &str) -> Option<String>;
}

/// One visibility change for one observed target.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord<N> {
    pub target: N,
    pub bounding_rect: ClientRect,
    /// `None` while the root has not been measured.
    pub root_bounds: Option<ClientRect>,
    /// Visible fraction of the target, in `[0, 1]`.
    pub intersection_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions<N> {
    /// Scroll root; `None` means the ambient top-level viewport.
    pub root: Option<N>,
    pub thresholds: Vec<f64>,
}

/// Receives each batch of change records an observer produces.
pub type BatchCallback<N> = Rc<dyn Fn(&[ChangeRecord<N>])>;

/// The host's push-based visibility observation primitive.
///
/// `unobserve` of a target that is not observed and repeated `disconnect`
/// calls must be harmless.
pub trait VisibilityObserver<N> {
    fn observe(&self, target: &N);
    fn unobserve(&self, target: &N);
    fn disconnect(&self);
}

pub trait Host: 'static {
    type Node: TaggedNode + Clone + PartialEq + fmt::Debug + 'static;
    type Observer: VisibilityObserver<Self::Node>;

    fn create_observer(
        &self,
        options: ObserverOptions<Self::Node>,
        callback: BatchCallback<Self::Node>,
    ) -> Self::Observer;

    /// Insert an invisible sentinel as a sibling of `region`, styled with
    /// `style`, and return the new node.
    fn insert_sentinel(
        &self,
        region: &Self::Node,
        sentinel: &Sentinel,
        style: &SentinelStyle,
    ) -> Result<Self::Node>;

    /// Remove a sentinel node. Removing an already removed node is a no-op.
    fn remove_sentinel(&self, node: &Self::Node);

    /// Computed CSS `position` of `node`, when the host can tell.
    fn computed_position(&self, node: &Self::Node) -> Option<String>;
}
