//! A layout-free host that models one document, its ambient viewport and any
//! number of scroll containers.
//!
//! Nodes are vertical boxes positioned in the content space of their nearest
//! scroll container (or the document when there is none). Scrolling moves the
//! content; observers follow the threshold rules of a browser intersection
//! observer: an initial notification on `observe`, then one record whenever
//! the intersecting flag or the crossed-threshold index changes. Records are
//! queued and only delivered on [`HeadlessHost::flush`], which stands in for
//! the host event loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, StickyError};
use crate::geometry::ClientRect;
use crate::sentinel::{Length, Sentinel, SentinelStyle};

use super::{BatchCallback, ChangeRecord, Host, ObserverOptions, TaggedNode, VisibilityObserver};

type NodeKey = usize;

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// Handle to a node of a [`HeadlessHost`]. Equality is node identity, so
/// nodes of different hosts never compare equal.
#[derive(Clone)]
pub struct HeadlessNode {
    document: u64,
    key: NodeKey,
    attributes: Rc<HashMap<String, String>>,
}

impl HeadlessNode {
    pub fn key(&self) -> usize {
        self.key
    }
}

impl PartialEq for HeadlessNode {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document && self.key == other.key
    }
}

impl fmt::Debug for HeadlessNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessNode")
            .field("document", &self.document)
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl TaggedNode for HeadlessNode {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }
}

#[derive(Debug, Clone, Copy)]
struct Scroller {
    client: ClientRect,
    scroll_top: f64,
    measured: bool,
}

impl Scroller {
    fn new(client: ClientRect) -> Self {
        Self {
            client,
            scroll_top: 0.0,
            measured: true,
        }
    }
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeKey>,
    /// Top edge in the content space of the node's scroll root.
    top: f64,
    height: f64,
    scroller: Option<Scroller>,
    position: Option<String>,
    removed: bool,
}

type TargetState = (bool, usize);

struct ObservedTarget {
    node: HeadlessNode,
    last: Option<TargetState>,
}

struct ObserverState {
    root: Option<NodeKey>,
    thresholds: Vec<f64>,
    callback: BatchCallback<HeadlessNode>,
    targets: Vec<ObservedTarget>,
    connected: bool,
}

struct Document {
    id: u64,
    nodes: Vec<NodeData>,
    viewport: Scroller,
    observers: Vec<ObserverState>,
    pending: Vec<(usize, ChangeRecord<HeadlessNode>)>,
}

impl Document {
    fn node(&self, key: NodeKey) -> Result<&NodeData> {
        self.nodes
            .get(key)
            .filter(|node| !node.removed)
            .ok_or_else(|| StickyError::UnknownNode(key.to_string()))
    }

    /// Key of a live node created by this document.
    fn resolve(&self, node: &HeadlessNode) -> Result<NodeKey> {
        if node.document != self.id {
            return Err(StickyError::UnknownNode(format!(
                "{} (document {})",
                node.key, node.document
            )));
        }
        self.node(node.key).map(|_| node.key)
    }

    fn push_node(&mut self, data: NodeData, attributes: HashMap<String, String>) -> HeadlessNode {
        let key = self.nodes.len();
        self.nodes.push(data);
        HeadlessNode {
            document: self.id,
            key,
            attributes: Rc::new(attributes),
        }
    }

    /// Nearest scroll container above `key`; `None` is the ambient viewport.
    fn scroll_root(&self, key: NodeKey) -> Option<NodeKey> {
        let mut current = self.nodes.get(key).and_then(|node| node.parent);
        while let Some(parent) = current {
            let data = self.nodes.get(parent)?;
            if data.scroller.is_some() {
                return Some(parent);
            }
            current = data.parent;
        }
        None
    }

    /// Scroller for `root`; `None` when the root is not a scroll container
    /// of this document.
    fn scroller(&self, root: Option<NodeKey>) -> Option<Scroller> {
        match root {
            None => Some(self.viewport),
            Some(key) => self.nodes.get(key).and_then(|node| node.scroller),
        }
    }

    fn scroller_mut(&mut self, root: Option<&HeadlessNode>) -> Result<&mut Scroller> {
        let Some(root) = root else {
            return Ok(&mut self.viewport);
        };
        let key = self.resolve(root)?;
        self.nodes[key]
            .scroller
            .as_mut()
            .ok_or_else(|| StickyError::Host(format!("node {key} is not a scroll container")))
    }

    fn client_rect(&self, key: NodeKey) -> Result<ClientRect> {
        let node = self.node(key)?;
        let scroller = self
            .scroller(self.scroll_root(key))
            .unwrap_or(self.viewport);
        Ok(ClientRect::new(
            scroller.client.top + node.top - scroller.scroll_top,
            scroller.client.left,
            scroller.client.width,
            node.height,
        ))
    }

    fn measure(
        &self,
        root: Option<NodeKey>,
        thresholds: &[f64],
        target: &HeadlessNode,
    ) -> Option<(ChangeRecord<HeadlessNode>, TargetState)> {
        let key = self.resolve(target).ok()?;
        let rect = self.client_rect(key).ok()?;
        let root_bounds = self
            .scroller(root)
            .filter(|scroller| scroller.measured && self.scroll_root(key) == root)
            .map(|scroller| scroller.client);

        let (intersecting, ratio) = match root_bounds {
            Some(bounds) if rect.intersects_vertically(&bounds) => {
                let ratio = if rect.height > 0.0 {
                    rect.vertical_overlap(&bounds) / rect.height
                } else {
                    1.0
                };
                (true, ratio)
            }
            _ => (false, 0.0),
        };
        let index = if intersecting {
            thresholds.iter().filter(|threshold| ratio >= **threshold).count()
        } else {
            0
        };

        let record = ChangeRecord {
            target: target.clone(),
            bounding_rect: rect,
            root_bounds,
            intersection_ratio: ratio,
        };
        Some((record, (intersecting, index)))
    }

    fn evaluate(&mut self, observer: usize, target: usize) {
        let state = &self.observers[observer];
        let node = state.targets[target].node.clone();
        let Some((record, current)) = self.measure(state.root, &state.thresholds, &node) else {
            return;
        };

        let slot = &mut self.observers[observer].targets[target];
        if slot.last != Some(current) {
            slot.last = Some(current);
            self.pending.push((observer, record));
        }
    }

    fn recompute(&mut self) {
        for observer in 0..self.observers.len() {
            if !self.observers[observer].connected {
                continue;
            }
            for target in 0..self.observers[observer].targets.len() {
                self.evaluate(observer, target);
            }
        }
    }

    fn observe(&mut self, observer: usize, node: &HeadlessNode) {
        if self.resolve(node).is_err() {
            return;
        }
        let state = &mut self.observers[observer];
        state.connected = true;
        if state.targets.iter().any(|target| target.node == *node) {
            return;
        }
        state.targets.push(ObservedTarget {
            node: node.clone(),
            last: None,
        });
        let index = state.targets.len() - 1;
        self.evaluate(observer, index);
    }

    fn unobserve(&mut self, observer: usize, node: &HeadlessNode) {
        self.observers[observer]
            .targets
            .retain(|target| target.node != *node);
        self.pending
            .retain(|(owner, record)| *owner != observer || record.target != *node);
    }

    fn disconnect(&mut self, observer: usize) {
        let state = &mut self.observers[observer];
        state.targets.clear();
        state.connected = false;
        self.pending.retain(|(owner, _)| *owner != observer);
    }
}

/// Shared handle to a headless document. Clones see the same document.
#[derive(Clone)]
pub struct HeadlessHost {
    doc: Rc<RefCell<Document>>,
}

impl HeadlessHost {
    /// New document whose ambient viewport is `viewport_height` tall.
    pub fn new(viewport_height: f64) -> Self {
        let document = Document {
            id: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            viewport: Scroller::new(ClientRect::vertical(0.0, viewport_height)),
            observers: Vec::new(),
            pending: Vec::new(),
        };
        Self {
            doc: Rc::new(RefCell::new(document)),
        }
    }

    /// Scroll container occupying `client` in viewport coordinates.
    pub fn scroll_container(&self, client: ClientRect) -> HeadlessNode {
        let data = NodeData {
            parent: None,
            top: client.top,
            height: client.height,
            scroller: Some(Scroller::new(client)),
            position: None,
            removed: false,
        };
        self.doc.borrow_mut().push_node(data, HashMap::new())
    }

    /// Block `height` tall placed `top` below its parent's top edge (or the
    /// content origin when the parent is a scroll container).
    pub fn append_block(
        &self,
        parent: Option<&HeadlessNode>,
        top: f64,
        height: f64,
    ) -> Result<HeadlessNode> {
        let mut doc = self.doc.borrow_mut();
        let origin = match parent {
            None => 0.0,
            Some(parent) => {
                let data = doc.node(doc.resolve(parent)?)?;
                if data.scroller.is_some() { 0.0 } else { data.top }
            }
        };
        let data = NodeData {
            parent: parent.map(HeadlessNode::key),
            top: origin + top,
            height,
            scroller: None,
            position: None,
            removed: false,
        };
        Ok(doc.push_node(data, HashMap::new()))
    }

    pub fn set_position(&self, node: &HeadlessNode, position: &str) -> Result<()> {
        let mut doc = self.doc.borrow_mut();
        let key = doc.resolve(node)?;
        doc.nodes[key].position = Some(position.to_string());
        Ok(())
    }

    /// Scroll `root` (or the ambient viewport) so its content offset is `y`.
    pub fn scroll_to(&self, root: Option<&HeadlessNode>, y: f64) -> Result<()> {
        let mut doc = self.doc.borrow_mut();
        doc.scroller_mut(root)?.scroll_top = y;
        doc.recompute();
        Ok(())
    }

    /// Toggle whether `root` has been laid out. Unmeasured roots produce
    /// records without root bounds.
    pub fn set_measured(&self, root: Option<&HeadlessNode>, measured: bool) -> Result<()> {
        let mut doc = self.doc.borrow_mut();
        doc.scroller_mut(root)?.measured = measured;
        doc.recompute();
        Ok(())
    }

    pub fn client_rect(&self, node: &HeadlessNode) -> Result<ClientRect> {
        let doc = self.doc.borrow();
        doc.client_rect(doc.resolve(node)?)
    }

    pub fn is_attached(&self, node: &HeadlessNode) -> bool {
        self.doc.borrow().resolve(node).is_ok()
    }

    /// Whether any connected observer currently watches `node`.
    pub fn is_observed(&self, node: &HeadlessNode) -> bool {
        self.doc.borrow().observers.iter().any(|observer| {
            observer.connected && observer.targets.iter().any(|target| target.node == *node)
        })
    }

    pub fn connected_observers(&self) -> usize {
        self.doc
            .borrow()
            .observers
            .iter()
            .filter(|observer| observer.connected)
            .count()
    }

    pub fn pending_records(&self) -> usize {
        self.doc.borrow().pending.len()
    }

    /// Deliver every queued record, one batch per observer, in queue order.
    /// Returns the number of records delivered.
    pub fn flush(&self) -> usize {
        let pending = std::mem::take(&mut self.doc.borrow_mut().pending);

        let mut batches: Vec<(usize, Vec<ChangeRecord<HeadlessNode>>)> = Vec::new();
        for (observer, record) in pending {
            match batches.iter_mut().find(|(owner, _)| *owner == observer) {
                Some((_, batch)) => batch.push(record),
                None => batches.push((observer, vec![record])),
            }
        }

        let mut delivered = 0;
        for (observer, records) in batches {
            let callback = {
                let doc = self.doc.borrow();
                let state = &doc.observers[observer];
                state.connected.then(|| Rc::clone(&state.callback))
            };
            if let Some(callback) = callback {
                delivered += records.len();
                callback(&records);
            }
        }
        delivered
    }

    fn resolve_length(raw: Option<&str>, basis: f64) -> Result<f64> {
        let raw = raw.unwrap_or("0");
        Length::from(raw)
            .resolve(basis)
            .ok_or_else(|| StickyError::Host(format!("cannot resolve sentinel length `{raw}`")))
    }
}

pub struct HeadlessObserver {
    doc: Rc<RefCell<Document>>,
    index: usize,
}

impl VisibilityObserver<HeadlessNode> for HeadlessObserver {
    fn observe(&self, target: &HeadlessNode) {
        self.doc.borrow_mut().observe(self.index, target);
    }

    fn unobserve(&self, target: &HeadlessNode) {
        self.doc.borrow_mut().unobserve(self.index, target);
    }

    fn disconnect(&self) {
        self.doc.borrow_mut().disconnect(self.index);
    }
}

impl Host for HeadlessHost {
    type Node = HeadlessNode;
    type Observer = HeadlessObserver;

    fn create_observer(
        &self,
        options: ObserverOptions<HeadlessNode>,
        callback: BatchCallback<HeadlessNode>,
    ) -> HeadlessObserver {
        let mut doc = self.doc.borrow_mut();
        // A root this document does not know is never measured.
        let root = options
            .root
            .map(|node| doc.resolve(&node).unwrap_or(NodeKey::MAX));
        doc.observers.push(ObserverState {
            root,
            thresholds: options.thresholds,
            callback,
            targets: Vec::new(),
            connected: true,
        });
        HeadlessObserver {
            doc: Rc::clone(&self.doc),
            index: doc.observers.len() - 1,
        }
    }

    /// Sentinels are absolutely positioned in the region's containing block:
    /// the top one `top` below the block's top edge, the bottom one flush
    /// with the block's bottom edge.
    fn insert_sentinel(
        &self,
        region: &HeadlessNode,
        sentinel: &Sentinel,
        style: &SentinelStyle,
    ) -> Result<HeadlessNode> {
        let mut doc = self.doc.borrow_mut();
        let region_key = doc.resolve(region)?;
        let block_key = doc
            .node(region_key)?
            .parent
            .ok_or_else(|| StickyError::Host("region has no containing block".to_string()))?;
        let block = doc.node(block_key)?;
        let (block_top, block_height) = if block.scroller.is_some() {
            (0.0, block.height)
        } else {
            (block.top, block.height)
        };

        let height = Self::resolve_length(style.get("height"), block_height)?;
        let top = match style.get("bottom") {
            Some(bottom) => {
                block_top + block_height - Self::resolve_length(Some(bottom), block_height)? - height
            }
            None => block_top + Self::resolve_length(style.get("top"), block_height)?,
        };

        let mut attributes: HashMap<String, String> = sentinel
            .attributes()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        attributes.insert("style".to_string(), style.to_css());

        let data = NodeData {
            parent: Some(block_key),
            top,
            height,
            scroller: None,
            position: style.get("position").map(str::to_string),
            removed: false,
        };
        Ok(doc.push_node(data, attributes))
    }

    fn remove_sentinel(&self, node: &HeadlessNode) {
        let mut doc = self.doc.borrow_mut();
        if let Ok(key) = doc.resolve(node) {
            doc.nodes[key].removed = true;
        }
    }

    fn computed_position(&self, node: &HeadlessNode) -> Option<String> {
        let doc = self.doc.borrow();
        let key = doc.resolve(node).ok()?;
        doc.nodes[key].position.clone()
    }
}
