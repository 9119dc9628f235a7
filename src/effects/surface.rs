//! Rendering surface abstraction
//!
//! The effects controllers never touch a DOM directly. They drive a
//! [`Surface`], which the browser bundle implements over real elements and
//! tests implement with [`RecordingSurface`].

use std::collections::{BTreeMap, BTreeSet};

/// Handle to a node on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Kinds of nodes the controllers inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    CursorProxy,
    CursorTrail,
    Ripple,
}

/// Host events a controller can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Listener {
    PointerMove,
    PointerDown,
    PointerUp,
    PointerOver,
    PointerOut,
    Scroll,
    VisibilityChange,
}

pub trait Surface {
    fn create_node(&mut self, kind: NodeKind) -> NodeId;
    fn remove_node(&mut self, node: NodeId);
    fn set_position(&mut self, node: NodeId, x: f64, y: f64);
    fn set_visible(&mut self, node: NodeId, visible: bool);
    /// Replace the node's state class; `None` clears it
    fn set_state_class(&mut self, node: NodeId, class: Option<&'static str>);
    fn toggle_class(&mut self, node: NodeId, class: &'static str, on: bool);
    /// `None` clears the transform
    fn set_transform(&mut self, node: NodeId, transform: Option<String>);
    fn add_listener(&mut self, listener: Listener);
    fn remove_listener(&mut self, listener: Listener);
    fn request_animation_frame(&mut self);
}

/// Observable state of one node on a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// `None` for host-owned elements
    pub kind: Option<NodeKind>,
    pub position: Option<(f64, f64)>,
    pub visible: bool,
    pub state_class: Option<&'static str>,
    pub classes: BTreeSet<&'static str>,
    pub transform: Option<String>,
    pub transform_writes: usize,
}

impl NodeRecord {
    fn new(kind: Option<NodeKind>) -> Self {
        Self {
            kind,
            position: None,
            visible: true,
            state_class: None,
            classes: BTreeSet::new(),
            transform: None,
            transform_writes: 0,
        }
    }
}

/// In-memory surface that records everything done to it
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_id: u32,
    pub nodes: BTreeMap<NodeId, NodeRecord>,
    /// Attached listeners with their attach counts
    pub listeners: BTreeMap<Listener, usize>,
    pub frame_requests: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host-owned element (e.g. a `data-parallax` section)
    pub fn add_element(&mut self) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(id, NodeRecord::new(None));
        id
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|n| n.kind == Some(kind)).count()
    }

    pub fn injected_count(&self) -> usize {
        self.nodes.values().filter(|n| n.kind.is_some()).count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().sum()
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| panic!("operation on unknown node {id:?}"))
    }
}

impl Surface for RecordingSurface {
    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(id, NodeRecord::new(Some(kind)));
        id
    }

    fn remove_node(&mut self, node: NodeId) {
        self.nodes.remove(&node);
    }

    fn set_position(&mut self, node: NodeId, x: f64, y: f64) {
        self.node_mut(node).position = Some((x, y));
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        self.node_mut(node).visible = visible;
    }

    fn set_state_class(&mut self, node: NodeId, class: Option<&'static str>) {
        self.node_mut(node).state_class = class;
    }

    fn toggle_class(&mut self, node: NodeId, class: &'static str, on: bool) {
        let classes = &mut self.node_mut(node).classes;
        if on {
            classes.insert(class);
        } else {
            classes.remove(class);
        }
    }

    fn set_transform(&mut self, node: NodeId, transform: Option<String>) {
        let record = self.node_mut(node);
        record.transform = transform;
        record.transform_writes += 1;
    }

    fn add_listener(&mut self, listener: Listener) {
        *self.listeners.entry(listener).or_default() += 1;
    }

    fn remove_listener(&mut self, listener: Listener) {
        if let Some(count) = self.listeners.get_mut(&listener) {
            *count -= 1;
            if *count == 0 {
                self.listeners.remove(&listener);
            }
        }
    }

    fn request_animation_frame(&mut self) {
        self.frame_requests += 1;
    }
}
