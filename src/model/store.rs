//! The node store: one arena holding every output, workspace, container and
//! view, plus the side tables that follow tree changes.

use slotmap::SecondaryMap;
use tracing::{debug, warn};

use super::error::{Result, TreeError};
use super::focus::{Activation, FocusGraph, FocusTracker, SeatId};
use super::node::{
    ContainerData, ContainerRole, Layout, NodeData, NodeKind, OutputData, Rank, ViewData,
    WorkspaceData,
};
use super::tree::{NodeId, NodeMap, Observer, Position, Tree};
use crate::common::collections::BTreeSet;
use crate::layout_engine::LayoutKind;
use crate::sys::geometry::Rect;

const FALLBACK_OUTPUT_NAME: &str = "FALLBACK";

/// Side tables kept in sync with the tree through [`Observer`].
#[derive(Default)]
pub struct Components {
    nodes: SecondaryMap<NodeId, NodeData>,
    focus: FocusTracker,
    dirty: BTreeSet<NodeId>,
    destroyed_views: Vec<NodeId>,
}

impl Observer for Components {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn attached(&mut self, map: &NodeMap, node: NodeId) {
        self.dirty.insert(node);
        if let Some(parent) = node.parent(map) {
            self.dirty.insert(parent);
        }
    }

    fn detaching(&mut self, map: &NodeMap, node: NodeId) {
        if let Some(parent) = node.parent(map) {
            self.dirty.insert(parent);
        }
    }

    fn removed_child(&mut self, _map: &NodeMap, parent: NodeId) { self.dirty.insert(parent); }

    fn removed_from_forest(&mut self, _map: &NodeMap, node: NodeId) {
        if let Some(data) = self.nodes.remove(node)
            && matches!(data.kind, NodeKind::View(_))
        {
            self.destroyed_views.push(node);
        }
        self.dirty.remove(&node);
        self.focus.forget(node);
    }
}

/// Read-only view over the tree and its payloads.
#[derive(Clone, Copy)]
pub struct Graph<'a> {
    pub map: &'a NodeMap,
    pub nodes: &'a SecondaryMap<NodeId, NodeData>,
}

impl<'a> Graph<'a> {
    pub fn get(&self, node: NodeId) -> Option<&'a NodeData> { self.nodes.get(node) }

    pub fn rank(&self, node: NodeId) -> Option<Rank> { self.get(node).map(NodeData::rank) }

    pub fn container(&self, node: NodeId) -> Option<&'a ContainerData> {
        self.get(node).and_then(NodeData::container)
    }

    pub fn role(&self, node: NodeId) -> Option<ContainerRole> {
        self.container(node).map(|c| c.role)
    }

    /// Tiling roots and floating holders, which exist for as long as their
    /// workspace or output does.
    pub fn is_pseudo(&self, node: NodeId) -> bool {
        matches!(self.role(node), Some(ContainerRole::Tiling | ContainerRole::Floating))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(self.map) }

    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + 'a {
        node.children(self.map)
    }

    pub fn workspace_of(&self, node: NodeId) -> Option<NodeId> {
        node.ancestors(self.map).find(|&n| self.rank(n) == Some(Rank::Workspace))
    }

    pub fn output_of(&self, node: NodeId) -> Option<NodeId> {
        node.ancestors(self.map).find(|&n| self.rank(n) == Some(Rank::Output))
    }

    /// The view held by a wrapper container, or the view itself.
    pub fn leaf_view(&self, node: NodeId) -> Option<NodeId> {
        match self.get(node)?.kind {
            NodeKind::View(_) => Some(node),
            NodeKind::Container(ContainerData { role: ContainerRole::Leaf, .. }) => {
                node.first_child(self.map).filter(|&c| self.rank(c) == Some(Rank::View))
            }
            _ => None,
        }
    }

    /// The container that moves, swaps and floats on behalf of `node`.
    pub fn movable(&self, node: NodeId) -> Option<NodeId> {
        match self.get(node)?.kind {
            NodeKind::View(_) => self.parent(node),
            NodeKind::Container(ref c) if !self.is_pseudo(node) && c.role != ContainerRole::Tiling => {
                Some(node)
            }
            _ => None,
        }
    }

    pub fn is_floating(&self, node: NodeId) -> bool {
        self.parent(node).is_some_and(|p| self.role(p) == Some(ContainerRole::Floating))
    }

    /// True if the node hangs off the root, through a real or fallback output.
    pub fn is_attached(&self, node: NodeId) -> bool {
        node.ancestors(self.map)
            .last()
            .and_then(|top| self.get(top))
            .is_some_and(|d| matches!(d.kind, NodeKind::Root | NodeKind::Output(_)))
    }
}

impl FocusGraph for Graph<'_> {
    fn contains(&self, node: NodeId) -> bool { self.nodes.contains_key(node) }

    fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(self.map) }

    fn is_within(&self, node: NodeId, root: NodeId) -> bool { node.is_within(root, self.map) }

    fn view_of(&self, node: NodeId) -> Option<NodeId> { self.leaf_view(node) }
}

pub struct NodeStore {
    tree: Tree<Components>,
    root: NodeId,
    /// Containers parked off-tree, oldest first.
    scratchpad: Vec<NodeId>,
    /// Holds workspaces while no real output exists.
    fallback_output: Option<NodeId>,
}

impl Default for NodeStore {
    fn default() -> Self { Self::new() }
}

impl NodeStore {
    pub fn new() -> Self {
        let mut tree = Tree::with_observer(Components::default());
        let root = tree.mk_node();
        let mut data = NodeData::new(NodeKind::Root);
        data.visible = true;
        tree.data.nodes.insert(root, data);
        NodeStore {
            tree,
            root,
            scratchpad: Vec::new(),
            fallback_output: None,
        }
    }

    pub fn root(&self) -> NodeId { self.root }

    pub fn graph(&self) -> Graph<'_> {
        Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        }
    }

    pub fn map(&self) -> &NodeMap { &self.tree.map }

    pub fn contains(&self, node: NodeId) -> bool { self.tree.data.nodes.contains_key(node) }

    pub fn get(&self, node: NodeId) -> Option<&NodeData> { self.tree.data.nodes.get(node) }

    pub fn data(&self, node: NodeId) -> Result<&NodeData> {
        self.get(node).ok_or(TreeError::NodeNotFound(node))
    }

    pub(crate) fn data_mut(&mut self, node: NodeId) -> Result<&mut NodeData> {
        self.tree.data.nodes.get_mut(node).ok_or(TreeError::NodeNotFound(node))
    }

    pub fn rank(&self, node: NodeId) -> Result<Rank> { self.data(node).map(NodeData::rank) }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(&self.tree.map) }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> { node.children(&self.tree.map).collect() }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = self.tree.mk_node();
        self.tree.data.nodes.insert(id, NodeData::new(kind));
        id
    }

    // Creation.

    /// Creates an output (with its sticky floating holder) under the root.
    pub fn create_output(&mut self, name: &str, rect: Rect) -> NodeId {
        let output = self.detached_output(name, rect, true);
        self.tree.attach(output, self.root, Position::Back);
        output
    }

    fn detached_output(&mut self, name: &str, rect: Rect, enabled: bool) -> NodeId {
        let sticky = self.create_container(ContainerRole::Floating, Layout::Floating);
        let output = self.insert(NodeKind::Output(OutputData {
            name: name.to_owned(),
            rect,
            active_workspace: None,
            sticky,
            enabled,
        }));
        if let Some(data) = self.tree.data.nodes.get_mut(output) {
            data.geometry = rect;
            data.visible = enabled;
        }
        self.tree.attach(sticky, output, Position::Front);
        output
    }

    /// Creates a workspace with an empty tiling root and floating holder. The
    /// first workspace of an output becomes its active one.
    pub fn create_workspace(
        &mut self,
        output: NodeId,
        name: &str,
        layout: LayoutKind,
    ) -> Result<NodeId> {
        if self.rank(output)? != Rank::Output {
            return Err(TreeError::NotAContainer(output));
        }
        if self.workspace_by_name(name).is_some() {
            return Err(TreeError::DuplicateWorkspace(name.to_owned()));
        }
        let layout = match layout {
            LayoutKind::Floating => LayoutKind::default(),
            other => other,
        };
        let tiling = self.create_container(ContainerRole::Tiling, Layout::from_kind(layout));
        let floating = self.create_container(ContainerRole::Floating, Layout::Floating);
        let ws = self.insert(NodeKind::Workspace(WorkspaceData {
            name: name.to_owned(),
            tiling,
            floating,
            fullscreen: None,
        }));
        self.tree.attach(tiling, ws, Position::Back);
        self.tree.attach(floating, ws, Position::Back);
        self.tree.attach(ws, output, Position::Back);
        let out = self.data_mut(output)?.output_mut().ok_or(TreeError::NotAContainer(output))?;
        if out.active_workspace.is_none() {
            out.active_workspace = Some(ws);
        }
        debug!(?ws, name, "created workspace");
        Ok(ws)
    }

    /// Creates a parentless container.
    pub fn create_container(&mut self, role: ContainerRole, layout: Layout) -> NodeId {
        self.insert(NodeKind::Container(ContainerData::new(role, layout)))
    }

    /// Creates a parentless view inside its own wrapper container and returns
    /// `(wrapper, view)`.
    pub fn create_view(&mut self, view: ViewData) -> (NodeId, NodeId) {
        let leaf = self.create_container(ContainerRole::Leaf, Layout::Floating);
        let id = self.insert(NodeKind::View(view));
        self.tree.attach(id, leaf, Position::Back);
        (leaf, id)
    }

    // Structural operations.

    fn invalid(&self, parent: NodeId, child: NodeId, reason: &'static str) -> TreeError {
        let rank = |n| self.get(n).map_or(Rank::Root, NodeData::rank);
        TreeError::InvalidHierarchy {
            parent,
            parent_rank: rank(parent),
            child,
            child_rank: rank(child),
            reason,
        }
    }

    /// Checks that `child` may live directly under `parent`. `replacing` is a
    /// child of `parent` that is about to leave.
    fn check_placement(
        &self,
        parent: NodeId,
        child: NodeId,
        replacing: Option<NodeId>,
    ) -> Result<()> {
        let pdata = self.data(parent)?;
        let cdata = self.data(child)?;
        if !ranks_nest(pdata.rank(), cdata.rank()) {
            return Err(self.invalid(parent, child, "child must rank below its parent"));
        }
        if parent.is_within(child, &self.tree.map) {
            return Err(self.invalid(parent, child, "would create a cycle"));
        }
        let reason = match (&pdata.kind, &cdata.kind) {
            (NodeKind::Root, NodeKind::Output(_)) => None,
            (NodeKind::Root, _) => Some("only outputs attach to the root"),
            (NodeKind::Output(_), NodeKind::Workspace(_)) => None,
            (NodeKind::Output(_), _) => Some("outputs hold workspaces"),
            (NodeKind::Workspace(_), NodeKind::Container(c))
                if matches!(c.role, ContainerRole::Tiling | ContainerRole::Floating) =>
            {
                None
            }
            (NodeKind::Workspace(_), _) => {
                Some("workspace content goes through its tiling or floating root")
            }
            (NodeKind::Container(p), NodeKind::Container(c)) => match (p.role, c.role) {
                (ContainerRole::Leaf, _) => Some("a view wrapper holds only its view"),
                (_, ContainerRole::Tiling | ContainerRole::Floating) => {
                    Some("workspace roots cannot be nested")
                }
                _ => None,
            },
            (NodeKind::Container(p), NodeKind::View(_)) => {
                if p.role != ContainerRole::Leaf {
                    Some("views live in wrapper containers")
                } else if parent.children(&self.tree.map).any(|c| Some(c) != replacing && c != child)
                {
                    Some("wrapper already holds a view")
                } else {
                    None
                }
            }
            (NodeKind::View(_), _) => Some("views have no children"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(self.invalid(parent, child, reason)),
            None => Ok(()),
        }
    }

    /// Inserts `child` under `parent` at `index` (appended if `None`). A view
    /// added to a split container is wrapped first. A child that already has
    /// a parent is moved.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<()> {
        let child = self.wrap_for(parent, child)?;
        if let Err(err) = self.check_placement(parent, child, None) {
            warn!(%err, "rejected add_child");
            return Err(err);
        }
        match child.parent(&self.tree.map) {
            Some(_) => {
                self.move_node(child, parent, index.into());
            }
            None => {
                self.tree.attach(child, parent, index.into());
            }
        }
        Ok(())
    }

    /// Puts a bare view into a fresh wrapper when it is headed for a
    /// non-wrapper container.
    fn wrap_for(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        let is_view = self.rank(child)? == Rank::View;
        let parent_is_leaf = self.graph().role(parent) == Some(ContainerRole::Leaf);
        if !is_view || parent_is_leaf || self.rank(parent)? != Rank::Container {
            return Ok(child);
        }
        if let Some(leaf) = self.parent(child)
            && self.graph().role(leaf) == Some(ContainerRole::Leaf)
        {
            return Ok(leaf);
        }
        let leaf = self.create_container(ContainerRole::Leaf, Layout::Floating);
        self.tree.attach(child, leaf, Position::Back);
        Ok(leaf)
    }

    /// Moves `node` and reaps the implicit containers it leaves empty.
    fn move_node(&mut self, node: NodeId, parent: NodeId, position: Position) -> bool {
        let old = self.parent(node);
        if !self.tree.move_to(node, parent, position) {
            return false;
        }
        if let Some(old) = old {
            self.reap_upwards(old);
        }
        true
    }

    /// Detaches `node` from its parent without destroying it. Focus inside it
    /// moves elsewhere, and implicit containers left empty are removed.
    /// Returns the nearest surviving ancestor.
    pub fn remove_child(&mut self, node: NodeId) -> Result<NodeId> {
        self.data(node)?;
        if node == self.root || self.graph().is_pseudo(node) {
            return Err(self.invalid(self.parent(node).unwrap_or(node), node, "structural node"));
        }
        let parent = self.parent(node).ok_or(TreeError::Detached(node))?;
        let survivor = self.reap_target(node).and_then(|top| self.parent(top)).unwrap_or(parent);
        self.detach_focus(node, Some(survivor));
        self.tree.detach(node);
        Ok(self.reap_upwards(parent).unwrap_or(survivor))
    }

    /// Puts `new` in `old`'s slot, inheriting its geometry. `old` ends up
    /// parentless.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.data(new)?;
        let parent = self.parent(old).ok_or(TreeError::Detached(old))?;
        if old == new {
            return Ok(());
        }
        if old == self.root || self.graph().is_pseudo(old) {
            return Err(self.invalid(parent, old, "structural node"));
        }
        self.check_placement(parent, new, Some(old))?;
        let nested = new.is_within(old, &self.tree.map);
        let fronts = self.fronts_within(old);
        if new.parent(&self.tree.map).is_some() {
            if nested {
                self.tree.detach(new);
            } else {
                self.detach_focus(new, self.parent(new));
                let from = self.tree.detach(new);
                if let Some(from) = from {
                    self.reap_upwards(from);
                }
            }
        }
        self.tree.attach(new, parent, Position::Before(old));
        self.tree.detach(old);
        let geometry = self.data(old)?.geometry;
        self.data_mut(new)?.geometry = geometry;
        for (seat, front) in fronts {
            if front.is_within(new, &self.tree.map) {
                continue;
            }
            let target = self.focus_inactive_or_key(seat, new);
            self.focus_raw(seat, target);
        }
        Ok(())
    }

    /// Exchanges two containers' positions. Geometry belongs to the slot, so
    /// each takes over the other's rectangle. Stack entries are exchanged,
    /// and a seat that focused either node keeps focusing it.
    pub fn swap(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        let g = self.graph();
        let a = g.movable(a).ok_or(TreeError::NotAContainer(a))?;
        let b = g.movable(b).ok_or(TreeError::NotAContainer(b))?;
        if a == b {
            return Ok(());
        }
        if a.is_within(b, &self.tree.map) || b.is_within(a, &self.tree.map) {
            return Err(TreeError::AncestorSwap { a, b });
        }
        self.parent(a).ok_or(TreeError::Detached(a))?;
        self.parent(b).ok_or(TreeError::Detached(b))?;

        let fronts: Vec<_> = self
            .fronts_within(a)
            .into_iter()
            .chain(self.fronts_within(b))
            .collect();
        if !self.tree.swap(a, b) {
            return Err(TreeError::AncestorSwap { a, b });
        }
        let ga = self.data(a)?.geometry;
        let gb = self.data(b)?.geometry;
        self.data_mut(a)?.geometry = gb;
        self.data_mut(b)?.geometry = ga;

        let (ka, kb) = (self.focus_key(a), self.focus_key(b));
        self.tree.data.focus.swap_entries(ka, kb);
        for (seat, front) in fronts {
            self.focus_raw(seat, front);
        }
        Ok(())
    }

    /// Moves `node` under `new_parent`, keeping its subtree and focus
    /// entries.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId, index: Option<usize>) -> Result<()> {
        if node == self.root || self.graph().is_pseudo(node) {
            return Err(self.invalid(new_parent, node, "structural node"));
        }
        let node = self.wrap_for(new_parent, node)?;
        self.check_placement(new_parent, node, None)?;
        if node.parent(&self.tree.map).is_none() {
            self.tree.attach(node, new_parent, index.into());
            return Ok(());
        }
        if !self.move_node(node, new_parent, index.into()) {
            return Err(self.invalid(new_parent, node, "position out of range"));
        }
        Ok(())
    }

    /// The topmost node that disappears along with `node`: implicit
    /// containers whose only child is on the path up.
    fn reap_target(&self, node: NodeId) -> Option<NodeId> {
        let g = self.graph();
        let mut top = node;
        while let Some(parent) = g.parent(top) {
            let reapable = g.container(parent).is_some_and(|c| c.auto);
            if !reapable || parent.child_count(g.map) != 1 {
                break;
            }
            top = parent;
        }
        Some(top)
    }

    /// Removes empty implicit containers starting at `node`. Returns the
    /// first ancestor that stays.
    fn reap_upwards(&mut self, mut node: NodeId) -> Option<NodeId> {
        loop {
            let g = self.graph();
            let reapable = g.container(node).is_some_and(|c| c.auto);
            if !reapable || !node.is_empty(g.map) {
                return Some(node);
            }
            let parent = g.parent(node);
            self.forget_references(node);
            self.tree.remove(node);
            node = parent?;
        }
    }

    /// Destroys `node` and its subtree. Non-empty workspaces are refused
    /// unless `force` is set. Focus is reassigned before anything is removed.
    pub fn destroy(&mut self, node: NodeId, force: bool) -> Result<()> {
        match self.rank(node)? {
            Rank::Root => return Err(self.invalid(node, node, "the root is permanent")),
            Rank::Output => return self.remove_output(node),
            Rank::Workspace if !force && !self.is_workspace_empty(node) => {
                return Err(TreeError::WorkspaceNotEmpty(node));
            }
            Rank::Workspace => return self.destroy_workspace(node),
            Rank::Container if self.graph().is_pseudo(node) => {
                return Err(self.invalid(node, node, "structural node"));
            }
            _ => {}
        }
        let doomed = self.reap_target(node).unwrap_or(node);
        let scope = self.parent(doomed);
        let fallback = scope.and_then(|s| self.focus_anchor(s));
        let graph = Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        };
        self.tree.data.focus.purge(&graph, doomed, scope, fallback);
        self.forget_references(doomed);
        self.tree.remove(doomed);
        debug!(?node, ?doomed, "destroyed");
        Ok(())
    }

    fn destroy_workspace(&mut self, ws: NodeId) -> Result<()> {
        let output = self.parent(ws);
        let mut next = None;
        if let Some(output) = output {
            next = self.workspaces(output).into_iter().find(|&w| w != ws);
            let out = self.data_mut(output)?.output_mut().ok_or(TreeError::NotAContainer(output))?;
            if out.active_workspace == Some(ws) {
                out.active_workspace = next;
            }
            next = out.active_workspace;
        }
        let graph = Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        };
        self.tree.data.focus.purge(&graph, ws, next, next);
        self.forget_references(ws);
        self.tree.remove(ws);
        debug!(?ws, "destroyed workspace");
        Ok(())
    }

    /// Clears pointers into a subtree that is about to go away.
    fn forget_references(&mut self, doomed: NodeId) {
        let map = &self.tree.map;
        self.scratchpad.retain(|s| !s.is_within(doomed, map));
        let Some(ws) = self.graph().workspace_of(doomed) else { return };
        let clear = self
            .workspace_data(ws)
            .is_ok_and(|w| w.fullscreen.is_some_and(|fs| fs.is_within(doomed, map)));
        if clear && let Some(w) = self.tree.data.nodes.get_mut(ws).and_then(NodeData::workspace_mut) {
            w.fullscreen = None;
        }
    }

    /// Where focus lands when nothing else inside `scope` was focused:
    /// pseudo containers hand off to their workspace, outputs to their active
    /// workspace.
    fn focus_anchor(&self, scope: NodeId) -> Option<NodeId> {
        let g = self.graph();
        match &g.get(scope)?.kind {
            NodeKind::Root => None,
            NodeKind::Output(o) => o.active_workspace,
            NodeKind::Container(_) if g.is_pseudo(scope) => match g.parent(scope) {
                Some(p) if g.rank(p) == Some(Rank::Output) => self.focus_anchor(p),
                p => p,
            },
            _ => Some(scope),
        }
    }

    fn detach_focus(&mut self, subtree: NodeId, survivor: Option<NodeId>) {
        let scope = survivor.and_then(|s| self.graph().workspace_of(s)).or(survivor);
        let fallback = survivor.and_then(|s| self.focus_anchor(s));
        let graph = Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        };
        self.tree.data.focus.handle_detach(&graph, subtree, scope, fallback);
    }

    // Focus.

    pub fn add_seat(&mut self, name: &str) -> SeatId { self.tree.data.focus.add_seat(name) }

    pub fn seat(&self, name: &str) -> Option<SeatId> { self.tree.data.focus.seat(name) }

    pub fn seats(&self) -> Vec<SeatId> { self.tree.data.focus.seat_ids().collect() }

    pub fn seat_name(&self, seat: SeatId) -> Option<&str> { self.tree.data.focus.seat_name(seat) }

    /// The node a focus stack records for `node`: wrappers are represented
    /// by their view.
    pub fn focus_key(&self, node: NodeId) -> NodeId { self.graph().leaf_view(node).unwrap_or(node) }

    pub fn set_focus(&mut self, seat: SeatId, node: NodeId) -> Result<()> {
        let rank = self.rank(node)?;
        if rank < Rank::Workspace || self.graph().is_pseudo(node) {
            return Err(self.invalid(node, node, "only workspaces and their content take focus"));
        }
        let key = self.focus_key(node);
        self.focus_raw(seat, key);
        Ok(())
    }

    fn focus_raw(&mut self, seat: SeatId, node: NodeId) {
        let graph = Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        };
        self.tree.data.focus.set_focus(&graph, seat, node);
    }

    fn focus_inactive_or_key(&self, seat: SeatId, root: NodeId) -> NodeId {
        self.get_focus_inactive(seat, root).unwrap_or_else(|| self.focus_key(root))
    }

    fn fronts_within(&self, node: NodeId) -> Vec<(SeatId, NodeId)> {
        self.seats()
            .into_iter()
            .filter_map(|seat| self.focused(seat).map(|f| (seat, f)))
            .filter(|&(_, f)| f.is_within(node, &self.tree.map))
            .collect()
    }

    pub fn focused(&self, seat: SeatId) -> Option<NodeId> {
        self.tree.data.focus.focused(&self.graph(), seat)
    }

    pub fn focus_stack(&self, seat: SeatId) -> Vec<NodeId> {
        self.tree.data.focus.stack(&self.graph(), seat)
    }

    pub fn get_focus_inactive(&self, seat: SeatId, root: NodeId) -> Option<NodeId> {
        self.tree.data.focus.get_focus_inactive(&self.graph(), seat, root)
    }

    pub fn active_child(&self, seat: SeatId, parent: NodeId) -> Option<NodeId> {
        self.tree.data.focus.active_child(&self.graph(), seat, parent)
    }

    /// The child shown by a tabbed or stacked container: the first seat
    /// (in seat order) with focus history inside it decides, otherwise the
    /// first child.
    pub fn visible_child(&self, parent: NodeId) -> Option<NodeId> {
        self.seats()
            .into_iter()
            .find_map(|seat| self.active_child(seat, parent))
            .or_else(|| parent.first_child(&self.tree.map))
    }

    pub fn is_focused_by_any(&self, node: NodeId) -> bool {
        self.tree.data.focus.is_focused_by_any(&self.graph(), node)
    }

    pub fn take_activations(&mut self) -> Vec<Activation> {
        let activations = self.tree.data.focus.take_activations();
        for a in &activations {
            if let Some(view) = self.tree.data.nodes.get_mut(a.view).and_then(NodeData::view_mut) {
                view.activated = a.activated;
            }
        }
        activations
    }

    // Outputs.

    pub fn outputs(&self) -> Vec<NodeId> {
        self.root.children(&self.tree.map).collect()
    }

    pub fn output_by_name(&self, name: &str) -> Option<NodeId> {
        self.outputs()
            .into_iter()
            .find(|&o| self.get(o).and_then(NodeData::output).is_some_and(|d| d.name == name))
    }

    pub fn fallback_output(&self) -> Option<NodeId> { self.fallback_output }

    fn ensure_fallback_output(&mut self) -> NodeId {
        if let Some(out) = self.fallback_output() {
            return out;
        }
        let out = self.detached_output(FALLBACK_OUTPUT_NAME, Rect::ZERO, false);
        self.fallback_output = Some(out);
        out
    }

    /// Removes an output, moving its workspaces to the first remaining
    /// output, or to the hidden fallback output when none is left.
    pub fn remove_output(&mut self, output: NodeId) -> Result<()> {
        let sticky = match self.data(output)?.output() {
            Some(o) => o.sticky,
            None => return Err(TreeError::NotAContainer(output)),
        };
        if Some(output) == self.fallback_output() {
            return Err(self.invalid(self.root, output, "the fallback output is permanent"));
        }
        let target = match self.outputs().into_iter().find(|&o| o != output) {
            Some(o) => o,
            None => self.ensure_fallback_output(),
        };
        let moved = self.workspaces(output);
        for &ws in &moved {
            self.tree.move_to(ws, target, Position::Back);
            if let Ok(data) = self.data_mut(ws) {
                data.visible = false;
            }
        }
        let target_active = {
            let out = self.data_mut(target)?.output_mut().ok_or(TreeError::NotAContainer(target))?;
            if out.active_workspace.is_none() {
                out.active_workspace = moved.first().copied();
            }
            out.active_workspace
        };
        // Sticky windows follow onto the target's visible workspace.
        let floating = target_active.and_then(|ws| self.get(ws)?.workspace().map(|w| w.floating));
        for child in self.children(sticky) {
            match floating {
                Some(floating) => {
                    self.tree.move_to(child, floating, Position::Back);
                }
                None => self.park_in_scratchpad(child),
            }
        }
        let graph = Graph {
            map: &self.tree.map,
            nodes: &self.tree.data.nodes,
        };
        self.tree.data.focus.purge(&graph, output, target_active, target_active);
        self.tree.remove(output);
        debug!(?output, ?target, workspaces = moved.len(), "removed output");
        Ok(())
    }

    /// Moves any workspaces parked on the fallback output to `output`.
    /// Returns how many were adopted.
    pub fn adopt_fallback_workspaces(&mut self, output: NodeId) -> Result<usize> {
        let Some(fallback) = self.fallback_output() else { return Ok(0) };
        let parked = self.workspaces(fallback);
        for &ws in &parked {
            self.tree.move_to(ws, output, Position::Back);
        }
        let active = self.data(fallback)?.output().and_then(|o| o.active_workspace);
        if let Some(fb) = self.data_mut(fallback)?.output_mut() {
            fb.active_workspace = None;
        }
        let out = self.data_mut(output)?.output_mut().ok_or(TreeError::NotAContainer(output))?;
        if out.active_workspace.is_none() {
            out.active_workspace = active.or(parked.first().copied());
        }
        Ok(parked.len())
    }

    pub fn sticky_root(&self, output: NodeId) -> Option<NodeId> {
        self.get(output)?.output().map(|o| o.sticky)
    }

    // Workspaces.

    pub fn workspaces(&self, output: NodeId) -> Vec<NodeId> {
        output
            .children(&self.tree.map)
            .filter(|&c| self.graph().rank(c) == Some(Rank::Workspace))
            .collect()
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<NodeId> {
        self.tree
            .data
            .nodes
            .iter()
            .find(|(_, d)| d.workspace().is_some_and(|w| w.name == name))
            .map(|(id, _)| id)
    }

    pub fn workspace_data(&self, ws: NodeId) -> Result<&WorkspaceData> {
        self.data(ws)?.workspace().ok_or(TreeError::NotAContainer(ws))
    }

    pub fn tiling_root(&self, ws: NodeId) -> Result<NodeId> { Ok(self.workspace_data(ws)?.tiling) }

    pub fn floating_root(&self, ws: NodeId) -> Result<NodeId> {
        Ok(self.workspace_data(ws)?.floating)
    }

    pub fn is_workspace_empty(&self, ws: NodeId) -> bool {
        self.workspace_data(ws)
            .is_ok_and(|w| w.tiling.is_empty(&self.tree.map) && w.floating.is_empty(&self.tree.map))
    }

    pub fn active_workspace(&self, output: NodeId) -> Option<NodeId> {
        self.get(output)?.output()?.active_workspace
    }

    /// Makes `ws` the visible workspace of its output. Returns the previously
    /// active one.
    pub fn set_active_workspace(&mut self, ws: NodeId) -> Result<Option<NodeId>> {
        self.workspace_data(ws)?;
        let output = self.parent(ws).ok_or(TreeError::Detached(ws))?;
        let out = self.data_mut(output)?.output_mut().ok_or(TreeError::NotAContainer(output))?;
        let previous = out.active_workspace.replace(ws);
        self.tree.data.dirty.insert(output);
        Ok(previous.filter(|&p| p != ws))
    }

    /// The first configured name not in use, else the lowest free positive
    /// number.
    pub fn next_workspace_name(&self, configured: &[String]) -> String {
        if let Some(name) = configured.iter().find(|n| self.workspace_by_name(n).is_none()) {
            return name.clone();
        }
        (1..)
            .map(|n: u32| n.to_string())
            .find(|n| self.workspace_by_name(n).is_none())
            .unwrap_or_default()
    }

    /// Moves a window to another workspace, floating windows into its
    /// floating holder and tiled ones to the end of its tiling root. Focus
    /// stays behind on the source workspace.
    pub fn move_to_workspace(&mut self, node: NodeId, ws: NodeId) -> Result<NodeId> {
        let g = self.graph();
        let movable = g.movable(node).ok_or(TreeError::NotAContainer(node))?;
        let target = if g.is_floating(movable) {
            self.floating_root(ws)?
        } else {
            self.tiling_root(ws)?
        };
        if g.workspace_of(movable) == Some(ws) {
            return Ok(movable);
        }
        let source = g.workspace_of(movable);
        self.detach_focus(movable, source);
        self.reparent(movable, target, None)?;
        Ok(movable)
    }

    // Fullscreen.

    /// Marks `node` fullscreen on its workspace, clearing any previous
    /// fullscreen container there. A container leaving fullscreen gets back
    /// the rectangle it had before.
    pub fn set_fullscreen(&mut self, node: NodeId, enable: bool) -> Result<()> {
        let node = self.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        let ws = self.graph().workspace_of(node).ok_or(TreeError::Detached(node))?;
        let previous = self.workspace_data(ws)?.fullscreen;
        if let Some(prev) = previous {
            let data = self.data_mut(prev)?;
            if let Some(saved) = data.container_mut().and_then(|c| {
                c.fullscreen = false;
                c.saved_geometry.take()
            }) {
                data.geometry = saved;
            }
        }
        let current = if enable || previous != Some(node) {
            enable.then_some(node)
        } else {
            None
        };
        if current.is_some() {
            let data = self.data_mut(node)?;
            let rect = data.geometry;
            if let Some(c) = data.container_mut() {
                c.fullscreen = true;
                c.saved_geometry = Some(rect);
            }
        }
        if let Some(w) = self.data_mut(ws)?.workspace_mut() {
            w.fullscreen = current;
        }
        self.tree.data.dirty.insert(ws);
        Ok(())
    }

    // Scratchpad.

    pub fn scratchpad(&self) -> &[NodeId] { &self.scratchpad }

    /// Sends a window to the scratchpad, hidden.
    pub fn move_to_scratchpad(&mut self, node: NodeId) -> Result<NodeId> {
        let node = self.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        if self.parent(node).is_some() {
            self.remove_child(node)?;
        }
        self.park_in_scratchpad(node);
        Ok(node)
    }

    fn park_in_scratchpad(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            let survivor = self.parent(node);
            self.detach_focus(node, survivor);
            self.tree.detach(node);
        }
        if let Ok(data) = self.data_mut(node) {
            data.visible = false;
            if let Some(c) = data.container_mut() {
                c.in_scratchpad = true;
            }
        }
        if !self.scratchpad.contains(&node) {
            self.scratchpad.push(node);
        }
    }

    /// Shows a scratchpad window floating on `ws` at `rect`.
    pub fn show_scratchpad(&mut self, node: NodeId, ws: NodeId, rect: Rect) -> Result<()> {
        if !self.scratchpad().contains(&node) {
            return Err(TreeError::NodeNotFound(node));
        }
        let floating = self.floating_root(ws)?;
        self.reparent(node, floating, None)?;
        self.data_mut(node)?.geometry = rect;
        Ok(())
    }

    /// Hides a shown scratchpad window again. It goes to the back of the
    /// queue so that showing cycles through the hidden windows.
    pub fn hide_scratchpad(&mut self, node: NodeId) -> Result<()> {
        if !self.scratchpad().contains(&node) {
            return Err(TreeError::NodeNotFound(node));
        }
        if self.parent(node).is_some() {
            self.park_in_scratchpad(node);
            self.scratchpad.retain(|&s| s != node);
            self.scratchpad.push(node);
        }
        Ok(())
    }

    /// Releases a window from the scratchpad; it stays where it is.
    pub fn remove_from_scratchpad(&mut self, node: NodeId) -> Result<()> {
        let node = self.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        self.scratchpad.retain(|&s| s != node);
        if let Some(c) = self.data_mut(node)?.container_mut() {
            c.in_scratchpad = false;
        }
        Ok(())
    }

    /// A scratchpad window currently shown on `ws`.
    pub fn shown_scratchpad_on(&self, ws: NodeId) -> Option<NodeId> {
        self.scratchpad()
            .iter()
            .copied()
            .find(|&s| self.graph().workspace_of(s) == Some(ws))
    }

    /// The oldest hidden scratchpad window.
    pub fn next_hidden_scratchpad(&self) -> Option<NodeId> {
        self.scratchpad().iter().copied().find(|&s| self.parent(s).is_none())
    }

    // Bookkeeping.

    pub fn mark_dirty(&mut self, node: NodeId) { self.tree.data.dirty.insert(node); }

    pub fn take_dirty(&mut self) -> BTreeSet<NodeId> { std::mem::take(&mut self.tree.data.dirty) }

    /// Views removed from the forest since the last call.
    pub fn take_destroyed_views(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.tree.data.destroyed_views)
    }

    pub fn views(&self) -> impl Iterator<Item = (NodeId, &ViewData)> + '_ {
        self.tree.data.nodes.iter().filter_map(|(id, d)| d.view().map(|v| (id, v)))
    }

    /// Checks that every parent/child pair is rank-ordered and that every node
    /// has a payload.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for id in self.tree.map.ids() {
            let data = self.get(id).ok_or_else(|| format!("{id:?} has no payload"))?;
            for child in id.children(&self.tree.map) {
                let cdata = self.get(child).ok_or_else(|| format!("{child:?} has no payload"))?;
                if !ranks_nest(data.rank(), cdata.rank()) {
                    return Err(format!(
                        "{child:?} ({}) under {id:?} ({})",
                        cdata.rank(),
                        data.rank()
                    ));
                }
                if let Some(c) = data.container()
                    && c.role == ContainerRole::Leaf
                    && (cdata.rank() != Rank::View || id.child_count(&self.tree.map) > 1)
                {
                    return Err(format!("wrapper {id:?} holds more than one view"));
                }
            }
        }
        Ok(())
    }

    /// Renders the subtree under `node` for logs and the dump command.
    pub fn draw_tree(&self, node: NodeId) -> String {
        let tree = self.ascii_tree(node);
        let mut out = String::new();
        if ascii_tree::write_tree(&mut out, &tree).is_err() {
            return format!("{node:?}");
        }
        out
    }

    fn ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let Some(data) = self.get(node) else {
            return ascii_tree::Tree::Leaf(vec![format!("{node:?} <missing>")]);
        };
        let mut desc = match &data.kind {
            NodeKind::Root => "root".to_owned(),
            NodeKind::Output(o) => format!("output {}", o.name),
            NodeKind::Workspace(w) => format!("workspace {}", w.name),
            NodeKind::Container(c) => format!("{} {}", c.role, c.layout.kind()),
            NodeKind::View(v) => format!("view {:?} {}", v.surface.0, v.title),
        };
        let r = data.geometry;
        desc.push_str(&format!(
            " [{} {} {}x{}]",
            r.origin.x, r.origin.y, r.size.width, r.size.height
        ));
        if self.is_focused_by_any(node) {
            desc.push_str(" *");
        }
        let children: Vec<_> =
            node.children(&self.tree.map).map(|c| self.ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }
}

/// Children rank strictly below their parent, except that containers nest.
fn ranks_nest(parent: Rank, child: Rank) -> bool {
    child > parent || (child == Rank::Container && parent == Rank::Container)
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::config::BorderStyle;
    use crate::model::node::SurfaceId;
    use crate::sys::geometry::Size;

    pub(crate) fn view(n: u64) -> ViewData {
        ViewData {
            surface: SurfaceId(n),
            title: format!("v{n}"),
            app_id: None,
            natural: Size::new(400.0, 300.0),
            border: BorderStyle::Normal,
            activated: false,
        }
    }

    struct Fixture {
        store: NodeStore,
        output: NodeId,
        ws: NodeId,
        tiling: NodeId,
        seat: SeatId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = NodeStore::new();
            let seat = store.add_seat("seat0");
            let output = store.create_output("DP-1", Rect::new(0.0, 0.0, 1000.0, 800.0));
            let ws = store.create_workspace(output, "1", LayoutKind::Horizontal).unwrap();
            let tiling = store.tiling_root(ws).unwrap();
            Fixture { store, output, ws, tiling, seat }
        }

        fn add_view(&mut self, parent: NodeId, n: u64) -> NodeId {
            let (leaf, view) = self.store.create_view(view(n));
            self.store.add_child(parent, leaf, None).unwrap();
            view
        }
    }

    #[test]
    fn new_store_has_only_root() {
        let store = NodeStore::new();
        assert_eq!(Rank::Root, store.rank(store.root()).unwrap());
        assert!(store.outputs().is_empty());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn workspace_layout() {
        let mut f = Fixture::new();
        let w = f.store.workspace_data(f.ws).unwrap().clone();
        assert_eq!(vec![w.tiling, w.floating], f.store.children(f.ws));
        assert_eq!(Some(f.ws), f.store.active_workspace(f.output));
        assert_eq!(Some(f.output), f.store.output_by_name("DP-1"));
        assert!(f.store.is_workspace_empty(f.ws));
        assert_eq!(
            Err(TreeError::DuplicateWorkspace("1".into())),
            f.store.create_workspace(f.output, "1", LayoutKind::Tabbed).map(|_| ())
        );
    }

    #[test]
    fn add_child_rejects_rank_violations() {
        let mut f = Fixture::new();
        let stray = f.store.create_container(ContainerRole::Split, Layout::Floating);
        let other_ws = f.store.create_workspace(f.output, "2", LayoutKind::Vertical).unwrap();
        let before = f.store.children(f.tiling);
        let err = f.store.add_child(stray, other_ws, None).unwrap_err();
        assert!(matches!(
            err,
            TreeError::InvalidHierarchy {
                parent_rank: Rank::Container,
                child_rank: Rank::Workspace,
                ..
            }
        ));
        assert_eq!(before, f.store.children(f.tiling));
        assert_eq!(Some(f.output), f.store.parent(other_ws));

        let err = f.store.add_child(f.store.root(), stray, None).unwrap_err();
        assert!(matches!(err, TreeError::InvalidHierarchy { .. }));
        assert!(f.store.check_invariants().is_ok());
    }

    #[test]
    fn add_child_rejects_cycles() {
        let mut f = Fixture::new();
        let outer = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(f.tiling, outer, None).unwrap();
        let inner = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(outer, inner, None).unwrap();
        let err = f.store.add_child(inner, outer, None).unwrap_err();
        assert!(matches!(err, TreeError::InvalidHierarchy { reason: "would create a cycle", .. }));
    }

    #[test]
    fn bare_views_are_wrapped() {
        let mut f = Fixture::new();
        let (leaf, v1) = f.store.create_view(view(1));
        f.store.add_child(f.tiling, v1, None).unwrap();
        assert_eq!(vec![leaf], f.store.children(f.tiling));

        let lonely = f.store.insert(NodeKind::View(view(2)));
        f.store.add_child(f.tiling, lonely, Some(0)).unwrap();
        let wrapper = f.store.parent(lonely).unwrap();
        assert_eq!(Some(ContainerRole::Leaf), f.store.graph().role(wrapper));
        assert_eq!(vec![wrapper, leaf], f.store.children(f.tiling));
        assert!(f.store.check_invariants().is_ok());
    }

    #[test]
    fn wrapper_holds_a_single_view() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let leaf = f.store.parent(v1).unwrap();
        let (_, v2) = f.store.create_view(view(2));
        let err = f.store.reparent(v2, leaf, None).unwrap_err();
        assert!(matches!(err, TreeError::InvalidHierarchy { .. }));
    }

    #[test]
    fn remove_child_reaps_wrapper_and_keeps_view() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        let leaf = f.store.parent(v1).unwrap();
        assert_eq!(f.tiling, f.store.remove_child(v1).unwrap());
        assert!(!f.store.contains(leaf));
        assert!(f.store.contains(v1));
        assert_eq!(vec![f.store.parent(v2).unwrap()], f.store.children(f.tiling));
        assert!(f.store.take_destroyed_views().is_empty());
    }

    #[test]
    fn replace_child_takes_slot_and_geometry() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        let leaf1 = f.store.parent(v1).unwrap();
        f.store.data_mut(leaf1).unwrap().geometry = Rect::new(0.0, 0.0, 500.0, 800.0);
        f.store.set_focus(f.seat, v1).unwrap();

        let (fresh, v3) = f.store.create_view(view(3));
        f.store.replace_child(leaf1, fresh).unwrap();
        assert_eq!(
            vec![fresh, f.store.parent(v2).unwrap()],
            f.store.children(f.tiling)
        );
        assert_eq!(None, f.store.parent(leaf1));
        assert_eq!(Rect::new(0.0, 0.0, 500.0, 800.0), f.store.data(fresh).unwrap().geometry);
        assert_eq!(Some(v3), f.store.focused(f.seat));
    }

    #[test]
    fn replace_child_with_own_descendant_flattens() {
        let mut f = Fixture::new();
        let split = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(f.tiling, split, None).unwrap();
        let v1 = f.add_view(split, 1);
        let leaf = f.store.parent(v1).unwrap();
        f.store.replace_child(split, leaf).unwrap();
        assert_eq!(vec![leaf], f.store.children(f.tiling));
        assert!(f.store.children(split).is_empty());
        assert!(f.store.check_invariants().is_ok());
    }

    #[test]
    fn swap_exchanges_slots_and_keeps_focus() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        let v3 = f.add_view(f.tiling, 3);
        let (l1, l3) = (f.store.parent(v1).unwrap(), f.store.parent(v3).unwrap());
        f.store.data_mut(l1).unwrap().geometry = Rect::new(0.0, 0.0, 10.0, 10.0);
        f.store.data_mut(l3).unwrap().geometry = Rect::new(20.0, 0.0, 10.0, 10.0);
        for v in [v1, v2, v3] {
            f.store.set_focus(f.seat, v).unwrap();
        }

        f.store.swap(v1, v3).unwrap();
        let l2 = f.store.parent(v2).unwrap();
        assert_eq!(vec![l3, l2, l1], f.store.children(f.tiling));
        assert_eq!(Rect::new(0.0, 0.0, 10.0, 10.0), f.store.data(l3).unwrap().geometry);
        assert_eq!(Rect::new(20.0, 0.0, 10.0, 10.0), f.store.data(l1).unwrap().geometry);
        assert_eq!(vec![v3, v1, v2], f.store.focus_stack(f.seat));
    }

    #[test]
    fn swap_rejects_ancestors() {
        let mut f = Fixture::new();
        let split = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(f.tiling, split, None).unwrap();
        let v1 = f.add_view(split, 1);
        let leaf = f.store.parent(v1).unwrap();
        assert_eq!(
            Err(TreeError::AncestorSwap { a: split, b: leaf }),
            f.store.swap(split, v1)
        );
        assert_eq!(Err(TreeError::NotAContainer(f.tiling)), f.store.swap(f.tiling, v1));
    }

    #[test]
    fn reparent_moves_and_reaps() {
        let mut f = Fixture::new();
        let split = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(f.tiling, split, None).unwrap();
        let v1 = f.add_view(split, 1);
        let floating = f.store.floating_root(f.ws).unwrap();
        f.store.reparent(v1, floating, None).unwrap();
        assert!(!f.store.contains(split));
        assert!(f.store.graph().is_floating(f.store.parent(v1).unwrap()));
    }

    #[test]
    fn destroy_reassigns_focus_to_previous_sibling_entry() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        let v3 = f.add_view(f.tiling, 3);
        for v in [v1, v2, v3] {
            f.store.set_focus(f.seat, v).unwrap();
        }
        assert_eq!(vec![v3, v2, v1], f.store.focus_stack(f.seat));
        f.store.take_activations();

        f.store.destroy(v3, false).unwrap();
        assert_eq!(vec![v2, v1], f.store.focus_stack(f.seat));
        assert_eq!(vec![v3], f.store.take_destroyed_views());
        assert_eq!(
            vec![Activation { view: v2, activated: true }],
            f.store.take_activations()
        );
        assert!(f.store.get(v2).unwrap().view().unwrap().activated);
        assert_eq!(2, f.store.children(f.tiling).len());
    }

    #[test]
    fn destroying_last_view_focuses_workspace() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        f.store.set_focus(f.seat, v1).unwrap();
        f.store.destroy(v1, false).unwrap();
        assert_eq!(vec![f.ws], f.store.focus_stack(f.seat));
        assert!(f.store.children(f.tiling).is_empty());
        assert!(f.store.contains(f.ws));
    }

    #[test]
    fn destroy_reaps_nested_implicit_containers() {
        let mut f = Fixture::new();
        let outer = f.store.create_container(ContainerRole::Split, Layout::Floating);
        let inner = f.store.create_container(ContainerRole::Split, Layout::Floating);
        f.store.add_child(f.tiling, outer, None).unwrap();
        f.store.add_child(outer, inner, None).unwrap();
        let v1 = f.add_view(inner, 1);
        f.store.destroy(v1, false).unwrap();
        assert!(!f.store.contains(outer));
        assert!(!f.store.contains(inner));
        assert!(f.store.children(f.tiling).is_empty());
    }

    #[test]
    fn workspace_destroy_requires_empty_or_force() {
        let mut f = Fixture::new();
        let ws2 = f.store.create_workspace(f.output, "2", LayoutKind::Horizontal).unwrap();
        let t2 = f.store.tiling_root(ws2).unwrap();
        let v = f.add_view(t2, 7);
        assert_eq!(Err(TreeError::WorkspaceNotEmpty(ws2)), f.store.destroy(ws2, false));
        f.store.destroy(ws2, true).unwrap();
        assert!(!f.store.contains(ws2));
        assert!(!f.store.contains(v));
        assert_eq!(vec![v], f.store.take_destroyed_views());
        assert_eq!(vec![f.ws], f.store.workspaces(f.output));
    }

    #[test]
    fn destroying_active_workspace_activates_next() {
        let mut f = Fixture::new();
        let ws2 = f.store.create_workspace(f.output, "2", LayoutKind::Horizontal).unwrap();
        f.store.set_focus(f.seat, f.ws).unwrap();
        f.store.destroy(f.ws, false).unwrap();
        assert_eq!(Some(ws2), f.store.active_workspace(f.output));
        assert_eq!(vec![ws2], f.store.focus_stack(f.seat));
    }

    #[test]
    fn root_and_pseudo_containers_are_permanent() {
        let mut f = Fixture::new();
        let root = f.store.root();
        assert!(f.store.destroy(root, true).is_err());
        assert!(f.store.destroy(f.tiling, true).is_err());
        assert!(f.store.remove_child(f.tiling).is_err());
    }

    #[test]
    fn removing_an_output_evacuates_workspaces() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        f.store.set_focus(f.seat, v1).unwrap();
        let second = f.store.create_output("HDMI-1", Rect::new(1000.0, 0.0, 800.0, 600.0));
        let ws2 = f.store.create_workspace(second, "2", LayoutKind::Horizontal).unwrap();

        f.store.remove_output(f.output).unwrap();
        assert_eq!(vec![second], f.store.outputs());
        assert_eq!(vec![ws2, f.ws], f.store.workspaces(second));
        assert_eq!(Some(ws2), f.store.active_workspace(second));
        assert_eq!(Some(v1), f.store.focused(f.seat));
        assert!(f.store.check_invariants().is_ok());
    }

    #[test]
    fn last_output_parks_workspaces_on_fallback() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        f.store.remove_output(f.output).unwrap();
        assert!(f.store.outputs().is_empty());
        let fallback = f.store.fallback_output().unwrap();
        assert_eq!(vec![f.ws], f.store.workspaces(fallback));
        assert!(f.store.contains(v1));

        let fresh = f.store.create_output("DP-2", Rect::new(0.0, 0.0, 640.0, 480.0));
        assert_eq!(1, f.store.adopt_fallback_workspaces(fresh).unwrap());
        assert_eq!(vec![f.ws], f.store.workspaces(fresh));
        assert_eq!(Some(f.ws), f.store.active_workspace(fresh));
        assert!(f.store.workspaces(fallback).is_empty());
    }

    #[test]
    fn sticky_windows_follow_evacuation() {
        let mut f = Fixture::new();
        let sticky = f.store.sticky_root(f.output).unwrap();
        let v1 = f.add_view(sticky, 1);
        let second = f.store.create_output("HDMI-1", Rect::new(1000.0, 0.0, 800.0, 600.0));
        let ws2 = f.store.create_workspace(second, "2", LayoutKind::Horizontal).unwrap();
        f.store.remove_output(f.output).unwrap();
        assert_eq!(Some(ws2), f.store.graph().workspace_of(v1));
    }

    #[test]
    fn workspace_names() {
        let mut f = Fixture::new();
        assert_eq!("2", f.store.next_workspace_name(&[]));
        assert_eq!("web", f.store.next_workspace_name(&["1".into(), "web".into()]));
        f.store.create_workspace(f.output, "2", LayoutKind::Horizontal).unwrap();
        assert_eq!("3", f.store.next_workspace_name(&["1".into()]));
    }

    #[test]
    fn move_to_workspace_leaves_focus_behind() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        f.store.set_focus(f.seat, v1).unwrap();
        f.store.set_focus(f.seat, v2).unwrap();
        let ws2 = f.store.create_workspace(f.output, "2", LayoutKind::Horizontal).unwrap();
        f.store.move_to_workspace(v2, ws2).unwrap();
        assert_eq!(Some(ws2), f.store.graph().workspace_of(v2));
        assert_eq!(Some(v1), f.store.focused(f.seat));
    }

    #[test]
    fn scratchpad_round_trip() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        f.store.set_focus(f.seat, v1).unwrap();
        f.store.set_focus(f.seat, v2).unwrap();
        let leaf = f.store.move_to_scratchpad(v2).unwrap();
        assert_eq!(&[leaf], f.store.scratchpad());
        assert_eq!(None, f.store.parent(leaf));
        assert_eq!(Some(v1), f.store.focused(f.seat));
        assert_eq!(Some(leaf), f.store.next_hidden_scratchpad());

        let rect = Rect::new(100.0, 100.0, 400.0, 300.0);
        f.store.show_scratchpad(leaf, f.ws, rect).unwrap();
        assert_eq!(Some(leaf), f.store.shown_scratchpad_on(f.ws));
        assert!(f.store.graph().is_floating(leaf));
        assert_eq!(rect, f.store.data(leaf).unwrap().geometry);

        f.store.hide_scratchpad(leaf).unwrap();
        assert_eq!(None, f.store.shown_scratchpad_on(f.ws));

        f.store.destroy(v2, false).unwrap();
        assert!(f.store.scratchpad().is_empty());
    }

    #[test]
    fn fullscreen_is_exclusive_per_workspace() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        let (l1, l2) = (f.store.parent(v1).unwrap(), f.store.parent(v2).unwrap());
        f.store.set_fullscreen(v1, true).unwrap();
        f.store.set_fullscreen(v2, true).unwrap();
        assert_eq!(Some(l2), f.store.workspace_data(f.ws).unwrap().fullscreen);
        assert!(!f.store.data(l1).unwrap().container().unwrap().fullscreen);
        f.store.destroy(v2, false).unwrap();
        assert_eq!(None, f.store.workspace_data(f.ws).unwrap().fullscreen);
    }

    #[test]
    fn visible_child_prefers_focus_history() {
        let mut f = Fixture::new();
        let v1 = f.add_view(f.tiling, 1);
        let v2 = f.add_view(f.tiling, 2);
        assert_eq!(f.store.parent(v1), f.store.visible_child(f.tiling));
        f.store.set_focus(f.seat, v2).unwrap();
        assert_eq!(f.store.parent(v2), f.store.visible_child(f.tiling));
    }

    #[test]
    fn dirty_set_tracks_structure_changes() {
        let mut f = Fixture::new();
        f.store.take_dirty();
        let v1 = f.add_view(f.tiling, 1);
        let dirty = f.store.take_dirty();
        assert!(dirty.contains(&f.tiling));
        assert!(dirty.contains(&f.store.parent(v1).unwrap()));
        assert!(f.store.take_dirty().is_empty());
    }

    #[test]
    fn draw_tree_lists_every_node() {
        let mut f = Fixture::new();
        f.add_view(f.tiling, 1);
        let text = f.store.draw_tree(f.store.root());
        assert!(text.contains("output DP-1"));
        assert!(text.contains("workspace 1"));
        assert!(text.contains("tiling horizontal"));
        assert!(text.contains("view 1 v1"));
    }
}
