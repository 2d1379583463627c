//! Geometry distribution.
//!
//! Arranging is planned against the current tree without touching it: every
//! node visited yields a [`Placement`], and the caller applies the whole plan
//! afterwards. Split children are weighted by the extent they had before the
//! pass, which is what makes a second arrange of an unchanged tree a no-op.

use tracing::{trace, warn};

use super::Orientation;
use crate::common::config::{FloatingSettings, GapSettings, LayoutSettings};
use crate::model::node::{ContainerRole, GroupStyle, Layout, NodeKind};
use crate::model::{NodeId, NodeStore};
use crate::sys::geometry::{Rect, RectExt, Size};

/// Guards the whole-pixel snap against sums like `332.99999999`.
const SNAP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub node: NodeId,
    pub rect: Rect,
    pub visible: bool,
}

/// Splits `extent` between children weighted by `weights`, leaving `gap`
/// between neighbours.
///
/// Non-positive weights stand for children that have never been laid out and
/// get the average weight of their siblings. Shares below `min` are raised to
/// it and the difference is taken proportionally from the others, as long as
/// every child can get `min`; otherwise the split stays purely proportional.
/// Edges are snapped to whole pixels and the last child takes the remainder,
/// so the lengths plus gaps always add up to `extent`.
pub fn distribute(extent: f64, weights: &[f64], min: f64, gap: f64) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let available = extent - gap * (n - 1) as f64;
    if available <= 0.0 {
        return vec![0.0; n];
    }

    let valid = |w: f64| w > 0.0 && w.is_finite();
    let known: Vec<f64> = weights.iter().copied().filter(|&w| valid(w)).collect();
    let fill = if known.is_empty() {
        1.0
    } else {
        known.iter().sum::<f64>() / known.len() as f64
    };
    let weights: Vec<f64> = weights.iter().map(|&w| if valid(w) { w } else { fill }).collect();

    let can_clamp = min > 0.0 && min * n as f64 <= available;
    let mut pinned = vec![false; n];
    let mut exact = vec![0.0; n];
    loop {
        let pinned_count = pinned.iter().filter(|&&p| p).count();
        let free = available - pinned_count as f64 * min;
        let weight_sum: f64 =
            weights.iter().zip(&pinned).filter(|(_, p)| !**p).map(|(w, _)| w).sum();
        if weight_sum <= 0.0 {
            break;
        }
        let mut changed = false;
        for i in 0..n {
            if pinned[i] {
                exact[i] = min;
                continue;
            }
            exact[i] = free * weights[i] / weight_sum;
            if can_clamp && exact[i] < min {
                pinned[i] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut lengths = Vec::with_capacity(n);
    let mut acc = 0.0;
    let mut prev_edge = 0.0;
    for (i, len) in exact.iter().enumerate() {
        if i + 1 == n {
            lengths.push(available - prev_edge);
            break;
        }
        acc += len;
        let edge = (acc + SNAP_EPSILON).floor();
        lengths.push(edge - prev_edge);
        prev_edge = edge;
    }
    lengths
}

pub(super) struct Planner<'a> {
    store: &'a NodeStore,
    layout: &'a LayoutSettings,
    floating: &'a FloatingSettings,
    gaps: GapSettings,
    bounds: Rect,
    pub placements: Vec<Placement>,
    pub degenerate: usize,
}

impl<'a> Planner<'a> {
    pub fn new(
        store: &'a NodeStore,
        layout: &'a LayoutSettings,
        floating: &'a FloatingSettings,
    ) -> Self {
        Planner {
            store,
            layout,
            floating,
            gaps: layout.gaps.effective_for_output(None),
            bounds: Rect::ZERO,
            placements: Vec::new(),
            degenerate: 0,
        }
    }

    fn place(&mut self, node: NodeId, rect: Rect, visible: bool) {
        self.placements.push(Placement { node, rect, visible });
    }

    /// Plans `node` into `rect`, whatever kind of node it is.
    pub fn node(&mut self, node: NodeId, rect: Rect, visible: bool) {
        let store = self.store;
        let Some(data) = store.get(node) else { return };
        match &data.kind {
            NodeKind::Root => {
                self.place(node, rect, true);
                for output in store.outputs() {
                    let rect = store.get(output).and_then(|d| d.output()).map_or(Rect::ZERO, |o| o.rect);
                    self.output(output, rect);
                }
            }
            NodeKind::Output(_) => self.output(node, rect),
            NodeKind::Workspace(_) => {
                self.enter_output(store.graph().output_of(node));
                self.workspace(node, rect, visible);
            }
            NodeKind::Container(c) if c.role == ContainerRole::Floating => {
                self.enter_output(store.graph().output_of(node));
                self.place(node, rect, visible);
                let ws_rect = store.graph().workspace_of(node).and_then(|w| store.get(w)).map_or(rect, |d| d.geometry);
                for child in store.children(node) {
                    self.floating_child(child, ws_rect, visible);
                }
            }
            NodeKind::Container(_) => {
                self.enter_output(store.graph().output_of(node));
                self.container(node, rect, visible);
            }
            NodeKind::View(_) => self.place(node, rect, visible),
        }
    }

    fn enter_output(&mut self, output: Option<NodeId>) {
        let Some(data) = output.and_then(|o| self.store.get(o)) else { return };
        if let Some(o) = data.output() {
            self.gaps = self.layout.gaps.effective_for_output(Some(&o.name));
            self.bounds = o.rect;
        }
    }

    fn output(&mut self, output: NodeId, rect: Rect) {
        let store = self.store;
        let Some(o) = store.get(output).and_then(|d| d.output()) else { return };
        self.enter_output(Some(output));
        self.bounds = rect;
        self.place(output, rect, o.enabled);
        for ws in store.workspaces(output) {
            if Some(ws) == o.active_workspace {
                self.workspace(ws, rect, o.enabled);
            } else {
                self.hide(ws);
            }
        }
        self.place(o.sticky, rect, o.enabled);
        for child in store.children(o.sticky) {
            self.floating_child(child, rect, o.enabled);
        }
    }

    fn workspace(&mut self, ws: NodeId, rect: Rect, visible: bool) {
        let store = self.store;
        let Some(w) = store.get(ws).and_then(|d| d.workspace()) else { return };
        self.place(ws, rect, visible);
        let outer = &self.gaps.outer;
        let content = rect.inset(outer.top, outer.left, outer.bottom, outer.right);
        match w.fullscreen {
            Some(fs) => {
                // Everything else keeps its geometry for when fullscreen ends.
                self.hide(w.tiling);
                self.hide(w.floating);
                self.container(fs, rect, visible);
            }
            None => {
                self.container(w.tiling, content, visible);
                self.place(w.floating, rect, visible);
                for child in store.children(w.floating) {
                    self.floating_child(child, rect, visible);
                }
            }
        }
    }

    /// Marks a subtree hidden, keeping its geometry.
    fn hide(&mut self, node: NodeId) {
        let store = self.store;
        for id in node.traverse_preorder(store.map()) {
            let rect = store.get(id).map_or(Rect::ZERO, |d| d.geometry);
            self.place(id, rect, false);
        }
    }

    /// Zero-area, invisible geometry for a whole subtree.
    fn collapse(&mut self, node: NodeId, rect: Rect) {
        let store = self.store;
        let at = rect.collapsed();
        for id in node.traverse_preorder(store.map()) {
            self.place(id, at, false);
        }
    }

    fn container(&mut self, node: NodeId, rect: Rect, visible: bool) {
        let store = self.store;
        let Some(c) = store.get(node).and_then(|d| d.container()) else { return };
        if rect.is_degenerate() && !store.children(node).is_empty() {
            warn!(?node, ?rect, "degenerate geometry, collapsing subtree");
            self.degenerate += 1;
            self.collapse(node, rect);
            return;
        }
        self.place(node, rect, visible);
        if c.role == ContainerRole::Leaf {
            self.leaf_view(node, rect, visible);
            return;
        }
        match &c.layout {
            Layout::Split { orientation } => self.split(node, rect, visible, *orientation),
            Layout::Grouped { style, .. } => self.grouped(node, rect, visible, *style),
            Layout::Floating => {
                for child in store.children(node) {
                    self.floating_child(child, rect, visible);
                }
            }
        }
    }

    fn leaf_view(&mut self, leaf: NodeId, rect: Rect, visible: bool) {
        let store = self.store;
        let Some(view) = store.children(leaf).into_iter().next() else { return };
        let (mut top, sides) = self.layout.decoration();
        let grouped = store
            .parent(leaf)
            .and_then(|p| store.get(p))
            .and_then(|d| d.container())
            .is_some_and(|c| c.layout.is_group());
        if grouped {
            // The tab strip already carries the title.
            top = sides;
        }
        let inner = rect.inset(top, sides, sides, sides);
        if inner.is_degenerate() {
            warn!(?view, ?rect, "no room for view inside its decorations");
            self.degenerate += 1;
            self.place(view, inner.collapsed(), false);
        } else {
            self.place(view, inner, visible);
        }
    }

    fn split(&mut self, node: NodeId, rect: Rect, visible: bool, orientation: Orientation) {
        let store = self.store;
        let children = store.children(node);
        if children.is_empty() {
            return;
        }
        let (min, gap) = match orientation {
            Orientation::Horizontal => (self.layout.min_sane_width, self.gaps.inner.horizontal),
            Orientation::Vertical => (self.layout.min_sane_height, self.gaps.inner.vertical),
        };
        let weights: Vec<f64> = children
            .iter()
            .map(|&c| store.get(c).map_or(0.0, |d| orientation.extent(d.geometry.size)))
            .collect();
        let lengths = distribute(orientation.extent(rect.size), &weights, min, gap);
        trace!(?node, ?weights, ?lengths, "split");
        let mut cursor = orientation.start(rect);
        for (&child, &len) in children.iter().zip(&lengths) {
            let child_rect = orientation.with_span(rect, cursor, len);
            self.container(child, child_rect, visible);
            cursor += len + gap;
        }
    }

    fn grouped(&mut self, node: NodeId, rect: Rect, visible: bool, style: GroupStyle) {
        let store = self.store;
        let children = store.children(node);
        if children.is_empty() {
            return;
        }
        let bars = match style {
            GroupStyle::Tabbed => 1.0,
            GroupStyle::Stacked => children.len() as f64,
        };
        let content = rect.inset(self.layout.titlebar_height * bars, 0.0, 0.0, 0.0);
        if content.is_degenerate() {
            warn!(?node, ?rect, "title bars leave no room for content");
            self.degenerate += 1;
            for child in children {
                self.collapse(child, content);
            }
            return;
        }
        let shown = store.visible_child(node);
        for child in children {
            self.container(child, content, visible && Some(child) == shown);
        }
    }

    /// Places a floating container at its own rectangle, within size limits
    /// and, if configured, inside the output.
    fn floating_child(&mut self, node: NodeId, workspace: Rect, visible: bool) {
        let Some(data) = self.store.get(node) else { return };
        let rect = constrain_floating(data.geometry, workspace, self.bounds, self.floating);
        self.container(node, rect, visible);
    }
}

/// Clamps a floating rectangle's size to the configured limits for
/// `workspace`, and its position into `output` when enabled.
pub fn constrain_floating(
    rect: Rect,
    workspace: Rect,
    output: Rect,
    settings: &FloatingSettings,
) -> Rect {
    let (min, max) = settings.constraints(workspace.size);
    let size = Size::new(
        rect.size.width.clamp(min.width, max.width.max(min.width)),
        rect.size.height.clamp(min.height, max.height.max(min.height)),
    );
    let mut out = Rect { origin: rect.origin, size };
    if settings.clamp_to_output && !output.is_degenerate() {
        out = out.clamp_within(&output);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn equal_weights_snap_with_remainder_last() {
        assert_eq!(vec![333.0, 333.0, 334.0], distribute(1000.0, &[1.0, 1.0, 1.0], 0.0, 0.0));
        assert_eq!(vec![333.0, 333.0, 334.0], distribute(1000.0, &[0.0, 0.0, 0.0], 0.0, 0.0));
    }

    #[test]
    fn proportional_to_previous_extents() {
        assert_eq!(vec![250.0, 750.0], distribute(1000.0, &[100.0, 300.0], 0.0, 0.0));
        // Re-distributing the output is exact.
        assert_eq!(vec![250.0, 750.0], distribute(1000.0, &[250.0, 750.0], 0.0, 0.0));
    }

    #[test]
    fn new_child_gets_average_share() {
        assert_eq!(
            vec![333.0, 333.0, 334.0],
            distribute(1000.0, &[500.0, 500.0, 0.0], 0.0, 0.0)
        );
    }

    #[test]
    fn gaps_are_subtracted_between_children() {
        let lengths = distribute(1000.0, &[1.0, 1.0], 0.0, 10.0);
        assert_eq!(vec![495.0, 495.0], lengths);
        assert_eq!(1000.0, lengths.iter().sum::<f64>() + 10.0);
    }

    #[test]
    fn small_shares_are_raised_to_minimum() {
        let lengths = distribute(1000.0, &[10.0, 495.0, 495.0], 100.0, 0.0);
        assert_eq!(100.0, lengths[0]);
        assert_eq!(1000.0, lengths.iter().sum::<f64>());
        assert_eq!(lengths[1], 450.0);
    }

    #[test]
    fn minimum_ignored_when_it_cannot_fit() {
        let lengths = distribute(150.0, &[1.0, 1.0], 100.0, 0.0);
        assert_eq!(vec![75.0, 75.0], lengths);
    }

    #[test]
    fn no_room_yields_zero_lengths() {
        assert_eq!(vec![0.0, 0.0], distribute(10.0, &[1.0, 1.0], 0.0, 20.0));
        assert!(distribute(100.0, &[], 0.0, 0.0).is_empty());
    }

    #[test]
    fn sum_holds_for_many_children() {
        for n in 1..=12 {
            let weights: Vec<f64> = (0..n).map(|i| (i * 37 % 11 + 1) as f64).collect();
            let lengths = distribute(1917.0, &weights, 20.0, 7.0);
            let total = lengths.iter().sum::<f64>() + 7.0 * (n - 1) as f64;
            assert_eq!(1917.0, total, "n = {n}");
        }
    }

    #[test]
    fn floating_rect_is_clamped() {
        let settings = FloatingSettings::default();
        let ws = Rect::new(0.0, 0.0, 1000.0, 800.0);
        let tiny = constrain_floating(Rect::new(10.0, 10.0, 5.0, 5.0), ws, ws, &settings);
        assert_eq!(Size::new(75.0, 50.0), tiny.size);
        let off = constrain_floating(Rect::new(900.0, 700.0, 300.0, 200.0), ws, ws, &settings);
        assert_eq!(Rect::new(700.0, 600.0, 300.0, 200.0), off);
        let huge = constrain_floating(Rect::new(0.0, 0.0, 4000.0, 100.0), ws, ws, &settings);
        assert_eq!(1000.0, huge.size.width);
    }
}
