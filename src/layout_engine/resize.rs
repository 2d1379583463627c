use tracing::debug;

use super::{Direction, Orientation};
use crate::common::config::FloatingSettings;
use crate::model::error::{Result, TreeError};
use crate::model::{NodeId, NodeStore};
use crate::sys::geometry::Rect;

/// Result of a resize. `applied` differs from `requested` when siblings or
/// size limits could not absorb the whole delta; that is a partial success,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOutcome {
    pub requested: f64,
    pub applied: f64,
}

impl ResizeOutcome {
    pub fn is_clamped(&self) -> bool { (self.requested - self.applied).abs() > f64::EPSILON }
}

fn extent(store: &NodeStore, node: NodeId, orientation: Orientation) -> f64 {
    store.get(node).map_or(0.0, |d| orientation.extent(d.geometry.size))
}

fn set_extent(store: &mut NodeStore, node: NodeId, orientation: Orientation, value: f64) -> Result<()> {
    let data = store.data_mut(node)?;
    let start = orientation.start(data.geometry);
    data.geometry = orientation.with_span(data.geometry, start, value);
    Ok(())
}

fn neighbours(store: &NodeStore, node: NodeId, edge: Direction) -> Vec<NodeId> {
    let map = store.map();
    let mut out = Vec::new();
    let mut cur = node;
    loop {
        let next = if edge.is_forward() {
            cur.next_sibling(map)
        } else {
            cur.prev_sibling(map)
        };
        let Some(next) = next else { break };
        out.push(next);
        cur = next;
    }
    out
}

/// Moves the `edge` of a tiled node by `delta` pixels.
///
/// The node that actually resizes is the nearest ancestor (or the node
/// itself) sitting in a split along the edge's axis with a sibling beyond
/// that edge. Growing takes space from those siblings, nearest first, down to
/// `min` each; shrinking hands the space to the adjacent sibling.
pub(super) fn resize_tiled(
    store: &mut NodeStore,
    node: NodeId,
    delta: f64,
    edge: Direction,
    min: f64,
) -> Result<ResizeOutcome> {
    let orientation = edge.orientation();
    let graph = store.graph();
    let start = graph.movable(node).ok_or(TreeError::NotAContainer(node))?;
    let target = start.ancestors(graph.map).find(|&n| {
        let Some(parent) = graph.parent(n) else { return false };
        let splits_along = graph
            .container(parent)
            .and_then(|c| c.layout.split_orientation())
            .is_some_and(|o| o == orientation);
        splits_along && !neighbours(store, n, edge).is_empty()
    });
    let Some(target) = target else {
        debug!(?node, ?edge, delta, "nothing to resize against");
        return Ok(ResizeOutcome { requested: delta, applied: 0.0 });
    };
    let side = neighbours(store, target, edge);
    let own = extent(store, target, orientation);

    let applied = if delta >= 0.0 {
        let mut remaining = delta;
        for &sibling in &side {
            if remaining <= 0.0 {
                break;
            }
            let len = extent(store, sibling, orientation);
            let give = remaining.min((len - min).max(0.0));
            set_extent(store, sibling, orientation, len - give)?;
            remaining -= give;
        }
        delta - remaining
    } else {
        let shrink = (-delta).min((own - min).max(0.0));
        let adjacent = side[0];
        let len = extent(store, adjacent, orientation);
        set_extent(store, adjacent, orientation, len + shrink)?;
        -shrink
    };
    set_extent(store, target, orientation, own + applied)?;
    if let Some(parent) = store.parent(target) {
        store.mark_dirty(parent);
    }
    let outcome = ResizeOutcome { requested: delta, applied };
    if outcome.is_clamped() {
        debug!(?node, ?edge, requested = delta, applied, "resize clamped");
    }
    Ok(outcome)
}

/// Moves the `edge` of a floating container, within its size limits.
pub(super) fn resize_floating(
    store: &mut NodeStore,
    node: NodeId,
    delta: f64,
    edge: Direction,
    workspace: Rect,
    settings: &FloatingSettings,
) -> Result<ResizeOutcome> {
    let node = store.graph().movable(node).ok_or(TreeError::NotAContainer(node))?;
    let rect = store.data(node)?.geometry;
    let orientation = edge.orientation();
    let (min, max) = settings.constraints(workspace.size);
    let (lo, hi) = match orientation {
        Orientation::Horizontal => (min.width, max.width.max(min.width)),
        Orientation::Vertical => (min.height, max.height.max(min.height)),
    };
    let old = orientation.extent(rect.size);
    let new = (old + delta).clamp(lo, hi);
    let applied = new - old;
    let start = if edge.is_forward() {
        orientation.start(rect)
    } else {
        orientation.start(rect) - applied
    };
    store.data_mut(node)?.geometry = orientation.with_span(rect, start, new);
    store.mark_dirty(node);
    let outcome = ResizeOutcome { requested: delta, applied };
    if outcome.is_clamped() {
        debug!(?node, ?edge, requested = delta, applied, "floating resize clamped");
    }
    Ok(outcome)
}
