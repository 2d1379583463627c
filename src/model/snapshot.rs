//! Read-only views of the tree for external consumers.

use serde::Serialize;

use super::node::{ContainerRole, NodeData, NodeKind, Rank};
use super::store::NodeStore;
use super::tree::NodeId;
use crate::layout_engine::LayoutKind;
use crate::sys::geometry::Rect;

/// Serializable copy of a subtree. Workspace and output holders are folded
/// into their owner: tiled content lands in `nodes`, floating and sticky
/// content in `floating_nodes`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: u64,
    #[serde(rename = "type")]
    pub rank: Rank,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub rect: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutKind>,
    pub focused: bool,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub nodes: Vec<NodeSnapshot>,
    pub floating_nodes: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn capture(store: &NodeStore, node: NodeId) -> Option<NodeSnapshot> {
        let data = store.get(node)?;
        let mut snap = NodeSnapshot {
            id: node.as_u64(),
            rank: data.rank(),
            name: data.name().map(str::to_owned),
            rect: data.geometry,
            layout: None,
            focused: store.is_focused_by_any(node),
            visible: data.visible,
            surface: None,
            activated: None,
            app_id: None,
            nodes: Vec::new(),
            floating_nodes: Vec::new(),
        };
        let capture_all = |parent: NodeId| -> Vec<NodeSnapshot> {
            store.children(parent).into_iter().filter_map(|c| Self::capture(store, c)).collect()
        };
        match &data.kind {
            NodeKind::Root => snap.nodes = capture_all(node),
            NodeKind::Output(o) => {
                snap.rect = o.rect;
                snap.nodes = store
                    .workspaces(node)
                    .into_iter()
                    .filter_map(|w| Self::capture(store, w))
                    .collect();
                snap.floating_nodes = capture_all(o.sticky);
            }
            NodeKind::Workspace(w) => {
                snap.layout = store.get(w.tiling).and_then(layout_of);
                snap.nodes = capture_all(w.tiling);
                snap.floating_nodes = capture_all(w.floating);
            }
            NodeKind::Container(c) if c.role == ContainerRole::Leaf => {
                // A wrapper is reported as its view, with the view's content
                // rect rather than the decorated one.
                let view = store.children(node).into_iter().next()?;
                let mut inner = Self::capture(store, view)?;
                inner.id = snap.id;
                inner.focused |= snap.focused;
                return Some(inner);
            }
            NodeKind::Container(_) => {
                snap.layout = layout_of(data);
                snap.nodes = capture_all(node);
            }
            NodeKind::View(v) => {
                snap.surface = Some(v.surface.0);
                snap.activated = Some(v.activated);
                snap.app_id = v.app_id.clone();
            }
        }
        Some(snap)
    }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(self) }
}

fn layout_of(data: &NodeData) -> Option<LayoutKind> { data.container().map(|c| c.layout.kind()) }

/// One step of a [`Walk`].
#[derive(Debug, Clone, Copy)]
pub struct WalkEntry<'a> {
    pub id: NodeId,
    pub depth: usize,
    pub data: &'a NodeData,
}

/// Depth-first, pre-order walk over a subtree. Children are visited in
/// sibling order.
pub struct Walk<'a> {
    store: &'a NodeStore,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Walk<'a> {
    pub fn new(store: &'a NodeStore, root: NodeId) -> Self {
        Walk { store, stack: vec![(root, 0)] }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, depth) = self.stack.pop()?;
            let Some(data) = self.store.get(id) else { continue };
            self.stack.extend(id.children_rev(self.store.map()).map(|c| (c, depth + 1)));
            return Some(WalkEntry { id, depth, data });
        }
    }
}

pub fn walk(store: &NodeStore, root: NodeId) -> Walk<'_> { Walk::new(store, root) }
