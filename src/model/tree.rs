//! Arena-backed ordered forest.
//!
//! This module only knows about structure: parent links and ordered sibling
//! lists. What a node *is* lives in side tables keyed by [`NodeId`] and is
//! kept in sync through the [`Observer`] hooks.

use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generation-checked handle to a node. A handle to a removed node never
    /// aliases a newer one.
    pub struct NodeId;
}

impl NodeId {
    /// Numeric id that stays fixed for the lifetime of the node.
    pub fn as_u64(self) -> u64 { slotmap::Key::data(&self).as_ffi() }
}

/// Hooks fired as the structure changes.
///
/// Hooks observe the map after the change for additions and before the change
/// for removals, so `detaching` can still see the node's old parent.
pub trait Observer {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId);
    fn attached(&mut self, map: &NodeMap, node: NodeId);
    fn detaching(&mut self, map: &NodeMap, node: NodeId);
    fn removed_child(&mut self, map: &NodeMap, parent: NodeId);
    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId);
}

impl Observer for () {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn attached(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn detaching(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removed_child(&mut self, _map: &NodeMap, _parent: NodeId) {}

    fn removed_from_forest(&mut self, _map: &NodeMap, _node: NodeId) {}
}

/// Where to put a node among its new siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Front,
    Back,
    /// Clamped to the number of children.
    Index(usize),
    Before(NodeId),
    After(NodeId),
}

impl From<Option<usize>> for Position {
    fn from(index: Option<usize>) -> Self { index.map_or(Position::Back, Position::Index) }
}

#[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    child_count: usize,
}

/// Structure of every tree in the forest.
#[derive(Default, Serialize, Deserialize)]
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ { self.map.keys() }

    /// Links a parentless `node` under `parent`. Returns false and leaves the
    /// map untouched if the position cannot be resolved.
    fn link(&mut self, node: NodeId, parent: NodeId, position: Position) -> bool {
        if node == parent || !self.contains(node) || !self.contains(parent) {
            return false;
        }
        debug_assert!(self.map[node].parent.is_none(), "linking a node that has a parent");
        let (prev, next) = match position {
            Position::Front => (None, self.map[parent].first_child),
            Position::Back => (self.map[parent].last_child, None),
            Position::Index(index) => {
                let next = parent.children(self).nth(index);
                let prev = match next {
                    Some(next) => self.map[next].prev_sibling,
                    None => self.map[parent].last_child,
                };
                (prev, next)
            }
            Position::Before(sibling) => {
                if sibling.parent(self) != Some(parent) {
                    return false;
                }
                (self.map[sibling].prev_sibling, Some(sibling))
            }
            Position::After(sibling) => {
                if sibling.parent(self) != Some(parent) {
                    return false;
                }
                (Some(sibling), self.map[sibling].next_sibling)
            }
        };

        let slot = &mut self.map[node];
        slot.parent = Some(parent);
        slot.prev_sibling = prev;
        slot.next_sibling = next;
        match prev {
            Some(prev) => self.map[prev].next_sibling = Some(node),
            None => self.map[parent].first_child = Some(node),
        }
        match next {
            Some(next) => self.map[next].prev_sibling = Some(node),
            None => self.map[parent].last_child = Some(node),
        }
        self.map[parent].child_count += 1;
        true
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let slot = self.map.get_mut(node)?;
        let parent = slot.parent.take()?;
        let prev = slot.prev_sibling.take();
        let next = slot.next_sibling.take();
        match prev {
            Some(prev) => self.map[prev].next_sibling = next,
            None => self.map[parent].first_child = next,
        }
        match next {
            Some(next) => self.map[next].prev_sibling = prev,
            None => self.map[parent].last_child = prev,
        }
        self.map[parent].child_count -= 1;
        Some(parent)
    }
}

impl Index<NodeId> for NodeMap {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

/// A forest plus the side tables that observe it.
#[derive(Default, Serialize, Deserialize)]
pub struct Tree<O> {
    pub map: NodeMap,
    pub data: O,
}

impl<O: Observer> Tree<O> {
    pub fn with_observer(data: O) -> Self { Tree { map: NodeMap::default(), data } }

    /// Creates a parentless node.
    pub fn mk_node(&mut self) -> NodeId {
        let id = self.map.map.insert(Node::default());
        self.data.added_to_forest(&self.map, id);
        id
    }

    /// Attaches a parentless node. Returns false if `node` already has a
    /// parent or the position does not belong to `parent`.
    pub fn attach(&mut self, node: NodeId, parent: NodeId, position: Position) -> bool {
        if node.parent(&self.map).is_some() || !self.map.link(node, parent, position) {
            return false;
        }
        self.data.attached(&self.map, node);
        true
    }

    /// Unlinks a node from its parent, keeping it and its subtree in the
    /// forest. Returns the former parent.
    pub fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        node.parent(&self.map)?;
        self.data.detaching(&self.map, node);
        let parent = self.map.unlink(node)?;
        self.data.removed_child(&self.map, parent);
        Some(parent)
    }

    /// Moves a node (with its subtree) to a new position. `position` is
    /// resolved after the node has been unlinked, so indices refer to the
    /// final sibling list.
    pub fn move_to(&mut self, node: NodeId, parent: NodeId, position: Position) -> bool {
        if node == parent || parent.ancestors(&self.map).any(|a| a == node) {
            return false;
        }
        let old = self.detach(node);
        if self.attach(node, parent, position) {
            return true;
        }
        // Put it back where it was rather than leaving it floating.
        if let Some(old) = old {
            self.attach(node, old, Position::Back);
        }
        false
    }

    /// Exchanges the positions of two nodes, which may share a parent.
    pub fn swap(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (Some(pa), Some(pb)) = (a.parent(&self.map), b.parent(&self.map)) else {
            return false;
        };
        if a.ancestors(&self.map).any(|n| n == b) || b.ancestors(&self.map).any(|n| n == a) {
            return false;
        }
        let ia = a.index_in_parent(&self.map).unwrap_or(0);
        let ib = b.index_in_parent(&self.map).unwrap_or(0);
        self.detach(a);
        self.detach(b);
        // Fill the lower slot first so the higher index is still valid.
        if pa == pb && ib < ia {
            self.attach(a, pb, Position::Index(ib));
            self.attach(b, pa, Position::Index(ia));
        } else {
            self.attach(b, pa, Position::Index(ia));
            self.attach(a, pb, Position::Index(ib));
        }
        true
    }

    /// Removes a node and everything below it from the forest.
    pub fn remove(&mut self, node: NodeId) {
        if !self.map.contains(node) {
            return;
        }
        self.detach(node);
        let doomed: Vec<_> = node.traverse_postorder(&self.map).collect();
        for id in doomed {
            self.data.removed_from_forest(&self.map, id);
        }
        for id in node.traverse_postorder(&self.map).collect::<Vec<_>>() {
            self.map.map.remove(id);
        }
    }
}

impl NodeId {
    pub fn parent(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self).and_then(|n| n.parent) }

    pub fn first_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.first_child)
    }

    pub fn last_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.last_child)
    }

    pub fn next_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.next_sibling)
    }

    pub fn prev_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.prev_sibling)
    }

    pub fn child_count(self, map: &NodeMap) -> usize {
        map.map.get(self).map_or(0, |n| n.child_count)
    }

    pub fn is_empty(self, map: &NodeMap) -> bool { self.first_child(map).is_none() }

    pub fn index_in_parent(self, map: &NodeMap) -> Option<usize> {
        let parent = self.parent(map)?;
        parent.children(map).position(|c| c == self)
    }

    pub fn children(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = self.first_child(map);
        std::iter::from_fn(move || {
            let id = cur?;
            cur = id.next_sibling(map);
            Some(id)
        })
    }

    pub fn children_rev(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = self.last_child(map);
        std::iter::from_fn(move || {
            let id = cur?;
            cur = id.prev_sibling(map);
            Some(id)
        })
    }

    /// This node followed by its parent, grandparent, and so on.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = map.contains(self).then_some(self);
        std::iter::from_fn(move || {
            let node = next?;
            next = node.parent(map);
            Some(node)
        })
    }

    /// True if `self` is `other` or lies below it.
    pub fn is_within(self, other: NodeId, map: &NodeMap) -> bool {
        self.ancestors(map).any(|a| a == other)
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let top = self;
        let mut cur = map.contains(self).then_some(self);
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.first_child(map).or_else(|| {
                node.ancestors(map)
                    .take_while(|&a| a != top)
                    .find_map(|a| a.next_sibling(map))
            });
            Some(node)
        })
    }

    pub fn traverse_postorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let descend = move |mut node: NodeId| {
            while let Some(child) = node.first_child(map) {
                node = child;
            }
            node
        };
        let top = self;
        let mut cur = map.contains(self).then(|| descend(self));
        std::iter::from_fn(move || {
            let node = cur?;
            cur = if node == top {
                None
            } else {
                match node.next_sibling(map) {
                    Some(next) => Some(descend(next)),
                    None => node.parent(map),
                }
            };
            Some(node)
        })
    }
}
