use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::arrange::{Placement, Planner};
use super::resize::{ResizeOutcome, resize_floating, resize_tiled};
use super::{Direction, LayoutKind, Orientation, floating};
use crate::common::collections::BTreeSet;
use crate::common::config::{FloatingSettings, LayoutSettings, Settings};
use crate::model::error::{Result, TreeError};
use crate::model::node::{ContainerRole, GroupStyle, Layout, NodeKind, Rank, SplitSnapshot};
use crate::model::{NodeId, NodeStore, SeatId};
use crate::sys::geometry::Rect;

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutCommand {
    MoveFocus(Direction),
    MoveNode(Direction),
    SwapNode(Direction),
    Resize { edge: Direction, delta: f64 },
    SetLayout(LayoutKind),
    Split(Orientation),
    ToggleSplit,
    ToggleFloating,
    ToggleFullscreen,
}

/// Outcome of one arrange pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Arrangement {
    pub placements: Vec<Placement>,
    /// Subtrees that got no room and were collapsed.
    pub degenerate: usize,
}

/// Axis a container lays its children along. Tabs run horizontally and
/// stacks vertically.
fn axis(layout: &Layout) -> Option<Orientation> {
    match layout {
        Layout::Split { orientation } => Some(*orientation),
        Layout::Grouped { style: GroupStyle::Tabbed, .. } => Some(Orientation::Horizontal),
        Layout::Grouped { style: GroupStyle::Stacked, .. } => Some(Orientation::Vertical),
        Layout::Floating => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    layout: LayoutSettings,
    floating: FloatingSettings,
}

impl LayoutEngine {
    pub fn new(settings: &Settings) -> Self {
        LayoutEngine {
            layout: settings.layout.clone(),
            floating: settings.floating.clone(),
        }
    }

    pub fn set_settings(&mut self, settings: &Settings) {
        self.layout = settings.layout.clone();
        self.floating = settings.floating.clone();
    }

    pub fn layout_settings(&self) -> &LayoutSettings { &self.layout }

    pub fn floating_settings(&self) -> &FloatingSettings { &self.floating }

    // Arranging.

    /// Re-arranges `node` inside the rectangle it owns: outputs and their
    /// workspaces use the output rectangle, containers their current one.
    pub fn arrange(&self, store: &mut NodeStore, node: NodeId) -> Result<Arrangement> {
        if store.rank(node)? == Rank::View {
            let leaf = store.parent(node).ok_or(TreeError::Detached(node))?;
            return self.arrange(store, leaf);
        }
        let data = store.data(node)?;
        let (rect, visible) = match &data.kind {
            NodeKind::Root => {
                let rect = store
                    .outputs()
                    .into_iter()
                    .filter_map(|o| store.get(o)?.output().map(|o| o.rect))
                    .fold(Rect::ZERO, |acc, r| acc.union(&r));
                (rect, true)
            }
            NodeKind::Output(o) => (o.rect, o.enabled),
            NodeKind::Workspace(_) => {
                let output = store.parent(node).ok_or(TreeError::Detached(node))?;
                let out = store.data(output)?.output().ok_or(TreeError::NotAContainer(output))?;
                (out.rect, out.enabled && out.active_workspace == Some(node))
            }
            NodeKind::Container(_) | NodeKind::View(_) => (data.geometry, data.visible),
        };
        self.arrange_with(store, node, rect, visible)
    }

    /// Distributes `rect` to `node` and everything below it.
    pub fn arrange_in(&self, store: &mut NodeStore, node: NodeId, rect: Rect) -> Result<Arrangement> {
        let visible = store.data(node)?.visible || store.rank(node)? == Rank::Root;
        self.arrange_with(store, node, rect, visible)
    }

    fn arrange_with(
        &self,
        store: &mut NodeStore,
        node: NodeId,
        rect: Rect,
        visible: bool,
    ) -> Result<Arrangement> {
        let mut planner = Planner::new(store, &self.layout, &self.floating);
        planner.node(node, rect, visible);
        let Planner { placements, degenerate, .. } = planner;
        trace!(?node, ?rect, count = placements.len(), "arranged");
        for p in &placements {
            let data = store.data_mut(p.node)?;
            data.geometry = p.rect;
            data.visible = p.visible;
        }
        Ok(Arrangement { placements, degenerate })
    }

    /// Arranges every enabled output holding one of `dirty`. Returns the
    /// outputs that were arranged, each once.
    pub fn arrange_dirty(
        &self,
        store: &mut NodeStore,
        dirty: impl IntoIterator<Item = NodeId>,
    ) -> Result<Vec<NodeId>> {
        let mut outputs = BTreeSet::new();
        for node in dirty {
            let graph = store.graph();
            match graph.rank(node) {
                None => continue,
                Some(Rank::Root) => outputs.extend(store.outputs()),
                Some(_) => outputs.extend(graph.output_of(node)),
            }
        }
        let mut arranged = Vec::new();
        for output in outputs {
            let enabled = store.get(output).and_then(|d| d.output()).is_some_and(|o| o.enabled);
            if !enabled {
                continue;
            }
            self.arrange(store, output)?;
            arranged.push(output);
        }
        Ok(arranged)
    }

    // Layout changes.

    /// The container whose layout a command on `node` changes: wrappers and
    /// views defer to their parent, workspaces to their tiling root.
    fn layout_target(&self, store: &NodeStore, node: NodeId) -> Result<NodeId> {
        let graph = store.graph();
        let target = match graph.rank(node).ok_or(TreeError::NodeNotFound(node))? {
            Rank::Workspace => store.tiling_root(node)?,
            Rank::View => {
                let leaf = graph.parent(node).ok_or(TreeError::Detached(node))?;
                graph.parent(leaf).ok_or(TreeError::Detached(leaf))?
            }
            Rank::Container if graph.role(node) == Some(ContainerRole::Leaf) => {
                graph.parent(node).ok_or(TreeError::Detached(node))?
            }
            Rank::Container => node,
            Rank::Root | Rank::Output => return Err(TreeError::NotAContainer(node)),
        };
        if graph.role(target) == Some(ContainerRole::Floating) {
            return Err(TreeError::NotAContainer(target));
        }
        Ok(target)
    }

    /// Switches the layout of the container holding `node`. Leaving a split
    /// for tabs or stacks keeps each child's rectangle; coming back restores
    /// them so the split looks as it did before.
    pub fn set_layout(&self, store: &mut NodeStore, node: NodeId, kind: LayoutKind) -> Result<NodeId> {
        if kind == LayoutKind::Floating {
            return Err(TreeError::UnsupportedLayout(kind));
        }
        let target = self.layout_target(store, node)?;
        let current = store
            .data(target)?
            .container()
            .map(|c| c.layout.clone())
            .ok_or(TreeError::NotAContainer(target))?;
        if current.kind() == kind {
            return Ok(target);
        }
        let children = store.children(target);
        let next = match (current, Layout::from_kind(kind)) {
            (Layout::Split { orientation }, Layout::Grouped { style, .. }) => {
                let extents = children
                    .iter()
                    .filter_map(|&c| store.get(c).map(|d| (c, d.geometry)))
                    .collect();
                Layout::Grouped {
                    style,
                    restore: Some(SplitSnapshot { orientation, extents }),
                }
            }
            (Layout::Grouped { restore, .. }, Layout::Grouped { style, .. }) => {
                Layout::Grouped { style, restore }
            }
            (Layout::Grouped { restore: Some(snapshot), .. }, split @ Layout::Split { .. }) => {
                for &child in &children {
                    let rect = snapshot
                        .extents
                        .iter()
                        .find(|(id, _)| *id == child)
                        .map_or(Rect::ZERO, |(_, rect)| *rect);
                    store.data_mut(child)?.geometry = rect;
                }
                debug!(?target, restored = snapshot.extents.len(), "restored split geometry");
                split
            }
            (_, next) => next,
        };
        if let Some(c) = store.data_mut(target)?.container_mut() {
            c.layout = next;
        }
        store.mark_dirty(target);
        debug!(?target, %kind, "set layout");
        Ok(target)
    }

    /// Flips the orientation of the split holding `node`.
    pub fn toggle_split(&self, store: &mut NodeStore, node: NodeId) -> Result<NodeId> {
        let target = self.layout_target(store, node)?;
        let layout = store.data(target)?.container().map(|c| c.layout.kind());
        let next = match layout {
            Some(LayoutKind::Horizontal) => LayoutKind::Vertical,
            _ => LayoutKind::Horizontal,
        };
        self.set_layout(store, target, next)
    }

    /// Prepares `node` so the next window opens beside it along
    /// `orientation`. A node alone in its split just changes the split's
    /// orientation; otherwise it is wrapped in a new container.
    pub fn split(&self, store: &mut NodeStore, node: NodeId, orientation: Orientation) -> Result<NodeId> {
        let kind = LayoutKind::from(orientation);
        if store.rank(node)? == Rank::Workspace || store.graph().role(node) == Some(ContainerRole::Tiling) {
            return self.set_layout(store, node, kind);
        }
        let target = store.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        if store.graph().is_floating(target) {
            return Err(TreeError::NotAContainer(target));
        }
        let parent = store.parent(target).ok_or(TreeError::Detached(target))?;
        let parent_is_split = store
            .data(parent)?
            .container()
            .is_some_and(|c| c.layout.split_orientation().is_some());
        if parent_is_split && store.children(parent).len() == 1 {
            return self.set_layout(store, parent, kind);
        }
        let index = target.index_in_parent(store.map());
        let wrapper = store.create_container(ContainerRole::Split, Layout::from_kind(kind));
        store.add_child(parent, wrapper, index)?;
        let rect = store.data(target)?.geometry;
        store.data_mut(wrapper)?.geometry = rect;
        store.reparent(target, wrapper, None)?;
        debug!(?target, ?wrapper, %kind, "split");
        Ok(wrapper)
    }

    // Movement.

    /// The sibling next to `node` in `direction`, if its parent lays out
    /// along that axis.
    fn sibling_towards(&self, store: &NodeStore, node: NodeId, direction: Direction) -> Option<NodeId> {
        let graph = store.graph();
        let parent = graph.parent(node)?;
        let layout = &graph.container(parent)?.layout;
        if axis(layout) != Some(direction.orientation()) {
            return None;
        }
        if direction.is_forward() {
            node.next_sibling(graph.map)
        } else {
            node.prev_sibling(graph.map)
        }
    }

    /// The closest container next to `node` in `direction`, leaving the
    /// tiling tree only to cross onto the neighbouring output.
    fn neighbour(&self, store: &NodeStore, node: NodeId, direction: Direction) -> Option<NodeId> {
        let graph = store.graph();
        for n in node.ancestors(graph.map) {
            if graph.is_pseudo(n) || graph.rank(n) != Some(Rank::Container) {
                break;
            }
            if let Some(sibling) = self.sibling_towards(store, n, direction) {
                return Some(sibling);
            }
        }
        let output = graph.output_of(node)?;
        let adjacent = self.output_towards(store, output, direction)?;
        store.active_workspace(adjacent)
    }

    /// The output sharing an edge with `output` on the `direction` side.
    fn output_towards(&self, store: &NodeStore, output: NodeId, direction: Direction) -> Option<NodeId> {
        let from = store.get(output)?.output()?.rect;
        let center = from.mid();
        store
            .outputs()
            .into_iter()
            .filter(|&o| o != output)
            .filter_map(|o| Some((o, store.get(o)?.output()?.rect)))
            .filter(|(_, r)| match direction {
                Direction::Left => r.max().x <= from.min().x,
                Direction::Right => r.min().x >= from.max().x,
                Direction::Up => r.max().y <= from.min().y,
                Direction::Down => r.min().y >= from.max().y,
            })
            .filter(|(_, r)| match direction.orientation() {
                Orientation::Horizontal => r.min().y < from.max().y && r.max().y > from.min().y,
                Orientation::Vertical => r.min().x < from.max().x && r.max().x > from.min().x,
            })
            .min_by(|(_, a), (_, b)| {
                let d = |r: &Rect| (r.mid().x - center.x).hypot(r.mid().y - center.y);
                d(a).total_cmp(&d(b))
            })
            .map(|(o, _)| o)
    }

    /// Where `seat`'s focus goes when moved in `direction`: the neighbouring
    /// container, descending to what was last focused inside it.
    pub fn focus_in_direction(
        &self,
        store: &NodeStore,
        seat: SeatId,
        direction: Direction,
    ) -> Option<NodeId> {
        let focused = store.focused(seat)?;
        let graph = store.graph();
        let start = match graph.rank(focused)? {
            Rank::Workspace => store.tiling_root(focused).ok()?,
            _ => graph.movable(focused).unwrap_or(focused),
        };
        if graph.is_floating(start) {
            return None;
        }
        let neighbour = self.neighbour(store, start, direction)?;
        let target = store
            .get_focus_inactive(seat, neighbour)
            .unwrap_or_else(|| store.focus_key(neighbour));
        trace!(?focused, ?target, %direction, "focus in direction");
        Some(target)
    }

    /// Moves a container one step in `direction`. Floating containers slide
    /// by a fixed step; tiled ones move past their sibling, into a sibling
    /// container, or out of their parent. Returns false when nothing moved.
    pub fn move_node(&self, store: &mut NodeStore, node: NodeId, direction: Direction) -> Result<bool> {
        let moving = store.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        if store.graph().is_floating(moving) {
            floating::nudge(store, moving, direction)?;
            return Ok(true);
        }
        let ws = store.graph().workspace_of(moving).ok_or(TreeError::Detached(moving))?;
        let tiling = store.tiling_root(ws)?;
        let old_parent = store.parent(moving);
        let forward = direction.is_forward();

        if let Some(sibling) = self.sibling_towards(store, moving, direction) {
            match self.entry_point(store, sibling, direction) {
                None => self.place_beside(store, moving, sibling, forward)?,
                Some(inner) => self.place_beside(store, moving, inner, !forward)?,
            }
        } else {
            let graph = store.graph();
            let escape = moving.ancestors(graph.map).skip(1).take_while(|&n| n != tiling).find(|&n| {
                graph
                    .parent(n)
                    .and_then(|p| graph.container(p))
                    .is_some_and(|c| axis(&c.layout) == Some(direction.orientation()))
            });
            match escape {
                Some(ancestor) => self.place_beside(store, moving, ancestor, forward)?,
                None => {
                    let root_axis = store.data(tiling)?.container().and_then(|c| axis(&c.layout));
                    if root_axis == Some(direction.orientation()) {
                        trace!(?moving, %direction, "already at the workspace edge");
                        return Ok(false);
                    }
                    let nested = self.nest_children(store, tiling)?;
                    self.set_layout(store, tiling, LayoutKind::from(direction.orientation()))?;
                    self.place_beside(store, moving, nested, forward)?;
                }
            }
        }
        if store.parent(moving) != old_parent {
            // New parents hand out an average share.
            store.data_mut(moving)?.geometry = Rect::ZERO;
        }
        store.mark_dirty(tiling);
        debug!(?moving, %direction, "moved");
        Ok(true)
    }

    /// Where a node entering `sibling` from the `direction` side lands: next
    /// to the first descendant along a matching axis. `None` for leaves and
    /// containers that never match.
    fn entry_point(&self, store: &NodeStore, sibling: NodeId, direction: Direction) -> Option<NodeId> {
        let graph = store.graph();
        let mut node = sibling;
        loop {
            let c = graph.container(node)?;
            if c.role == ContainerRole::Leaf {
                return (node != sibling).then_some(node);
            }
            let next = store.visible_child(node)?;
            if axis(&c.layout) == Some(direction.orientation()) {
                return Some(next);
            }
            node = next;
        }
    }

    /// Moves `node` next to `target`, after it when `after` is set.
    fn place_beside(&self, store: &mut NodeStore, node: NodeId, target: NodeId, after: bool) -> Result<()> {
        let parent = store.parent(target).ok_or(TreeError::Detached(target))?;
        let siblings: Vec<_> = store.children(parent).into_iter().filter(|&c| c != node).collect();
        let at = siblings.iter().position(|&c| c == target).ok_or(TreeError::Detached(target))?;
        store.reparent(node, parent, Some(at + usize::from(after)))
    }

    /// Moves all children of a tiling root into one new container that
    /// keeps the root's layout.
    fn nest_children(&self, store: &mut NodeStore, tiling: NodeId) -> Result<NodeId> {
        let (layout, rect) = {
            let data = store.data(tiling)?;
            let layout = data.container().map(|c| c.layout.clone()).ok_or(TreeError::NotAContainer(tiling))?;
            (layout, data.geometry)
        };
        let nested = store.create_container(ContainerRole::Split, layout);
        let children = store.children(tiling);
        store.add_child(tiling, nested, None)?;
        store.data_mut(nested)?.geometry = rect;
        for child in children {
            store.reparent(child, nested, None)?;
        }
        Ok(nested)
    }

    /// Finds the container next to `node` in `direction` and swaps the two.
    pub fn swap_in_direction(
        &self,
        store: &mut NodeStore,
        node: NodeId,
        direction: Direction,
    ) -> Result<Option<NodeId>> {
        let moving = store.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
        let Some(neighbour) = self.neighbour(store, moving, direction) else { return Ok(None) };
        let graph = store.graph();
        let other = graph
            .leaf_view(neighbour)
            .and_then(|v| graph.movable(v))
            .or_else(|| graph.movable(neighbour));
        let Some(other) = other else { return Ok(None) };
        store.swap(moving, other)?;
        Ok(Some(other))
    }

    // Sizing.

    /// Resizes the `edge` of `node` by `delta` pixels. Tiled nodes trade
    /// space with their siblings down to the sane minimum; floating ones are
    /// held to the floating limits.
    pub fn resize(
        &self,
        store: &mut NodeStore,
        node: NodeId,
        delta: f64,
        edge: Direction,
    ) -> Result<ResizeOutcome> {
        let graph = store.graph();
        let target = graph.movable(node).ok_or(TreeError::NotAContainer(node))?;
        if graph.is_floating(target) {
            let ws = graph.workspace_of(target).ok_or(TreeError::Detached(target))?;
            let ws_rect = store.data(ws)?.geometry;
            return resize_floating(store, target, delta, edge, ws_rect, &self.floating);
        }
        let min = match edge.orientation() {
            Orientation::Horizontal => self.layout.min_sane_width,
            Orientation::Vertical => self.layout.min_sane_height,
        };
        resize_tiled(store, target, delta, edge, min)
    }

    pub fn toggle_floating(&self, store: &mut NodeStore, node: NodeId) -> Result<NodeId> {
        floating::toggle_floating(store, node, &self.layout, &self.floating)
    }

    /// The rectangle a scratchpad container gets when shown on `ws`.
    pub fn scratchpad_rect(&self, store: &NodeStore, node: NodeId, ws: NodeId) -> Result<Rect> {
        floating::initial_floating_rect(store, node, ws, &self.layout, &self.floating)
    }
}
