use tracing::debug;

use super::Direction;
use super::arrange::constrain_floating;
use crate::common::config::{FloatingSettings, LayoutSettings};
use crate::model::error::{Result, TreeError};
use crate::model::{NodeId, NodeStore};
use crate::sys::geometry::{Rect, Size};

/// Distance a floating container travels per move command.
pub const FLOATING_MOVE_STEP: f64 = 10.0;

/// Size a container asks for when it starts floating: its view's natural
/// size plus decorations, or half the workspace for anything else.
fn preferred_size(store: &NodeStore, node: NodeId, layout: &LayoutSettings, ws: Rect) -> Size {
    let graph = store.graph();
    let natural = graph.leaf_view(node).and_then(|v| graph.get(v)).and_then(|d| d.view());
    match natural {
        Some(view) if !view.natural.is_empty() => {
            let (top, sides) = layout.decoration();
            Size::new(
                view.natural.width + 2.0 * sides,
                view.natural.height + top + sides,
            )
        }
        _ => Size::new(ws.size.width / 2.0, ws.size.height / 2.0),
    }
}

/// Where a container lands when it becomes floating on `ws`: the rectangle it
/// had the last time it floated, or its preferred size centred on the
/// workspace, then held to the floating limits.
pub fn initial_floating_rect(
    store: &NodeStore,
    node: NodeId,
    ws: NodeId,
    layout: &LayoutSettings,
    floating: &FloatingSettings,
) -> Result<Rect> {
    let ws_rect = store.data(ws)?.geometry;
    let saved = store.data(node)?.container().and_then(|c| c.saved_floating);
    let rect = match saved {
        Some(rect) => rect,
        None => ws_rect.centered(preferred_size(store, node, layout, ws_rect)),
    };
    let output = store
        .graph()
        .output_of(ws)
        .and_then(|o| store.get(o))
        .and_then(|d| d.output())
        .map_or(ws_rect, |o| o.rect);
    Ok(constrain_floating(rect, ws_rect, output, floating))
}

/// Floats a tiled container, or tiles a floating one. Returns the container
/// that changed place.
pub fn toggle_floating(
    store: &mut NodeStore,
    node: NodeId,
    layout: &LayoutSettings,
    floating: &FloatingSettings,
) -> Result<NodeId> {
    let graph = store.graph();
    let node = graph.movable(node).ok_or(TreeError::NotAContainer(node))?;
    let ws = graph.workspace_of(node).ok_or(TreeError::Detached(node))?;
    if graph.is_floating(node) {
        let rect = store.data(node)?.geometry;
        let tiling = store.tiling_root(ws)?;
        store.reparent(node, tiling, None)?;
        let data = store.data_mut(node)?;
        if let Some(c) = data.container_mut() {
            c.saved_floating = Some(rect);
        }
        // A zero extent makes the split hand it an average share.
        data.geometry = Rect::ZERO;
        // A scratchpad window that gets tiled is an ordinary window again.
        if store.scratchpad().contains(&node) {
            store.remove_from_scratchpad(node)?;
        }
        debug!(?node, "tiled");
    } else {
        let rect = initial_floating_rect(store, node, ws, layout, floating)?;
        let holder = store.floating_root(ws)?;
        store.reparent(node, holder, None)?;
        store.data_mut(node)?.geometry = rect;
        debug!(?node, ?rect, "floated");
    }
    store.mark_dirty(ws);
    Ok(node)
}

/// Moves a floating container one step in `direction`.
pub fn nudge(store: &mut NodeStore, node: NodeId, direction: Direction) -> Result<Rect> {
    let data = store.data_mut(node)?;
    let mut rect = data.geometry;
    match direction {
        Direction::Left => rect.origin.x -= FLOATING_MOVE_STEP,
        Direction::Right => rect.origin.x += FLOATING_MOVE_STEP,
        Direction::Up => rect.origin.y -= FLOATING_MOVE_STEP,
        Direction::Down => rect.origin.y += FLOATING_MOVE_STEP,
    }
    data.geometry = rect;
    store.mark_dirty(node);
    Ok(rect)
}
