//! Per-seat focus stacks.
//!
//! Stacks hold [`NodeId`]s, which are weak: the tracker never keeps a node
//! alive, and a handle to a removed node simply stops resolving. Entries for
//! nodes that are about to be destroyed are first marked stale, a successor is
//! chosen among the remaining live entries, and only then are the stale
//! entries dropped.

use serde::{Deserialize, Serialize};

use super::tree::NodeId;
use crate::common::collections::BTreeSet;

/// The read-only view of the tree the tracker needs.
pub trait FocusGraph {
    fn contains(&self, node: NodeId) -> bool;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// True if `node` is `root` or one of its descendants.
    fn is_within(&self, node: NodeId, root: NodeId) -> bool;
    /// The view whose activation state follows focus on `node`, if any.
    fn view_of(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    Live,
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FocusEntry {
    node: NodeId,
    state: EntryState,
}

#[derive(Debug)]
struct Seat {
    name: String,
    /// Front (index 0) is the focused node.
    stack: Vec<FocusEntry>,
}

/// A change to a view's activated state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Activation {
    pub view: NodeId,
    pub activated: bool,
}

#[derive(Debug, Default)]
pub struct FocusTracker {
    seats: Vec<Seat>,
    activations: Vec<Activation>,
}

impl FocusTracker {
    pub fn add_seat(&mut self, name: &str) -> SeatId {
        if let Some(id) = self.seat(name) {
            return id;
        }
        self.seats.push(Seat { name: name.to_owned(), stack: Vec::new() });
        SeatId(self.seats.len() as u32 - 1)
    }

    pub fn seat(&self, name: &str) -> Option<SeatId> {
        self.seats.iter().position(|s| s.name == name).map(|i| SeatId(i as u32))
    }

    pub fn seat_name(&self, seat: SeatId) -> Option<&str> {
        self.seats.get(seat.0 as usize).map(|s| s.name.as_str())
    }

    pub fn seat_ids(&self) -> impl Iterator<Item = SeatId> + '_ {
        (0..self.seats.len()).map(|i| SeatId(i as u32))
    }

    pub fn focused(&self, graph: &impl FocusGraph, seat: SeatId) -> Option<NodeId> {
        self.live(graph, seat).next()
    }

    /// The seat's live stack, front first.
    pub fn stack(&self, graph: &impl FocusGraph, seat: SeatId) -> Vec<NodeId> {
        self.live(graph, seat).collect()
    }

    pub fn is_focused_by_any(&self, graph: &impl FocusGraph, node: NodeId) -> bool {
        self.seat_ids().any(|seat| self.focused(graph, seat) == Some(node))
    }

    /// Moves `node` to the front of the seat's stack and records activation
    /// changes for the views involved.
    pub fn set_focus(&mut self, graph: &impl FocusGraph, seat: SeatId, node: NodeId) {
        let before = self.active_views(graph);
        self.raise(seat, node);
        self.record_activation_diff(graph, &before, &BTreeSet::new());
    }

    /// The most recently focused node within `root` (inclusive), without
    /// changing the stack.
    pub fn get_focus_inactive(
        &self,
        graph: &impl FocusGraph,
        seat: SeatId,
        root: NodeId,
    ) -> Option<NodeId> {
        self.live(graph, seat).find(|&node| graph.is_within(node, root))
    }

    /// The child of `parent` that leads to the seat's most recent focus
    /// inside `parent`.
    pub fn active_child(
        &self,
        graph: &impl FocusGraph,
        seat: SeatId,
        parent: NodeId,
    ) -> Option<NodeId> {
        self.live(graph, seat)
            .filter(|&node| node != parent)
            .find_map(|node| child_towards(graph, node, parent))
    }

    /// Handles the destruction of the subtree rooted at `doomed`.
    ///
    /// Every entry inside the subtree goes stale. A seat whose front entry
    /// went stale is refocused on its most recent entry inside `scope`, or on
    /// `fallback` if there is none.
    pub fn purge(
        &mut self,
        graph: &impl FocusGraph,
        doomed: NodeId,
        scope: Option<NodeId>,
        fallback: Option<NodeId>,
    ) {
        let before = self.active_views(graph);
        let mut dropped_views = BTreeSet::new();
        for index in 0..self.seats.len() {
            let seat = &mut self.seats[index];
            let mut front_lost = false;
            for (i, entry) in seat.stack.iter_mut().enumerate() {
                if entry.state == EntryState::Live && graph.is_within(entry.node, doomed) {
                    entry.state = EntryState::Stale;
                    front_lost |= i == 0;
                    if let Some(view) = graph.view_of(entry.node) {
                        dropped_views.insert(view);
                    }
                }
            }
            let successor = if front_lost {
                self.successor(graph, SeatId(index as u32), scope, fallback)
            } else {
                None
            };
            self.seats[index].stack.retain(|e| e.state == EntryState::Live);
            if let Some(successor) = successor {
                self.raise(SeatId(index as u32), successor);
            }
        }
        self.record_activation_diff(graph, &before, &dropped_views);
    }

    /// Like [`FocusTracker::purge`], for a subtree that is being detached but
    /// stays alive (scratchpad, output evacuation). Its entries are kept so
    /// that focus can return to it later.
    pub fn handle_detach(
        &mut self,
        graph: &impl FocusGraph,
        subtree: NodeId,
        scope: Option<NodeId>,
        fallback: Option<NodeId>,
    ) {
        let before = self.active_views(graph);
        for index in 0..self.seats.len() {
            let seat = SeatId(index as u32);
            let Some(front) = self.focused(graph, seat) else { continue };
            if !graph.is_within(front, subtree) {
                continue;
            }
            let successor = scope
                .and_then(|scope| {
                    self.live(graph, seat)
                        .find(|&n| graph.is_within(n, scope) && !graph.is_within(n, subtree))
                })
                .or(fallback.filter(|&f| !graph.is_within(f, subtree)));
            match successor {
                Some(successor) => self.raise(seat, successor),
                // Nothing else to focus; demote the detached subtree instead.
                None => {
                    let stack = &mut self.seats[index].stack;
                    let entry = stack.remove(0);
                    stack.push(entry);
                }
            }
        }
        self.record_activation_diff(graph, &before, &BTreeSet::new());
    }

    /// Exchanges the stack positions of `a` and `b` in every seat.
    pub fn swap_entries(&mut self, a: NodeId, b: NodeId) {
        for seat in &mut self.seats {
            for entry in &mut seat.stack {
                if entry.node == a {
                    entry.node = b;
                } else if entry.node == b {
                    entry.node = a;
                }
            }
            dedup_stack(&mut seat.stack);
        }
    }

    /// Drops every entry for a node that has left the forest.
    pub fn forget(&mut self, node: NodeId) {
        for seat in &mut self.seats {
            seat.stack.retain(|e| e.node != node);
        }
    }

    pub fn take_activations(&mut self) -> Vec<Activation> { std::mem::take(&mut self.activations) }

    /// Views currently activated: the union over seats of the view under each
    /// seat's focus.
    pub fn active_views(&self, graph: &impl FocusGraph) -> BTreeSet<NodeId> {
        self.seat_ids()
            .filter_map(|seat| self.focused(graph, seat))
            .filter_map(|node| graph.view_of(node))
            .collect()
    }

    fn live<'a>(
        &'a self,
        graph: &'a impl FocusGraph,
        seat: SeatId,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.seats
            .get(seat.0 as usize)
            .into_iter()
            .flat_map(|s| s.stack.iter())
            .filter(move |e| e.state == EntryState::Live && graph.contains(e.node))
            .map(|e| e.node)
    }

    fn successor(
        &self,
        graph: &impl FocusGraph,
        seat: SeatId,
        scope: Option<NodeId>,
        fallback: Option<NodeId>,
    ) -> Option<NodeId> {
        scope
            .and_then(|scope| self.get_focus_inactive(graph, seat, scope))
            .or(fallback)
            .filter(|&node| graph.contains(node))
    }

    fn raise(&mut self, seat: SeatId, node: NodeId) {
        let Some(seat) = self.seats.get_mut(seat.0 as usize) else { return };
        seat.stack.retain(|e| e.node != node);
        seat.stack.insert(0, FocusEntry { node, state: EntryState::Live });
    }

    fn record_activation_diff(
        &mut self,
        graph: &impl FocusGraph,
        before: &BTreeSet<NodeId>,
        gone: &BTreeSet<NodeId>,
    ) {
        let after = self.active_views(graph);
        for &view in before.difference(&after) {
            if !gone.contains(&view) {
                self.activations.push(Activation { view, activated: false });
            }
        }
        for &view in after.difference(before) {
            self.activations.push(Activation { view, activated: true });
        }
    }
}

fn dedup_stack(stack: &mut Vec<FocusEntry>) {
    let mut seen = BTreeSet::new();
    stack.retain(|e| seen.insert(e.node));
}

/// Walks up from `node` to the ancestor whose parent is `parent`.
fn child_towards(graph: &impl FocusGraph, node: NodeId, parent: NodeId) -> Option<NodeId> {
    let mut cur = node;
    loop {
        let up = graph.parent(cur)?;
        if up == parent {
            return Some(cur);
        }
        cur = up;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::collections::HashSet;
    use crate::model::tree::{NodeMap, Position, Tree};

    /// ```text
    ///          ws
    ///        /    \
    ///      c1      split
    ///      |      /     \
    ///      v1    c2      c3
    ///            |       |
    ///            v2      v3
    /// ```
    struct Fixture {
        tree: Tree<()>,
        views: HashSet<NodeId>,
        ws: NodeId,
        split: NodeId,
        c1: NodeId,
        v1: NodeId,
        c2: NodeId,
        v2: NodeId,
        c3: NodeId,
        v3: NodeId,
        focus: FocusTracker,
        seat: SeatId,
    }

    struct G<'a>(&'a NodeMap, &'a HashSet<NodeId>);

    impl FocusGraph for G<'_> {
        fn contains(&self, node: NodeId) -> bool { self.0.contains(node) }

        fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(self.0) }

        fn is_within(&self, node: NodeId, root: NodeId) -> bool { node.is_within(root, self.0) }

        fn view_of(&self, node: NodeId) -> Option<NodeId> {
            if self.1.contains(&node) {
                return Some(node);
            }
            node.first_child(self.0).filter(|c| self.1.contains(c))
        }
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = Tree::with_observer(());
            let mut mk = |parent: Option<NodeId>| {
                let id = tree.mk_node();
                if let Some(parent) = parent {
                    tree.attach(id, parent, Position::Back);
                }
                id
            };
            let ws = mk(None);
            let c1 = mk(Some(ws));
            let v1 = mk(Some(c1));
            let split = mk(Some(ws));
            let c2 = mk(Some(split));
            let v2 = mk(Some(c2));
            let c3 = mk(Some(split));
            let v3 = mk(Some(c3));
            let mut focus = FocusTracker::default();
            let seat = focus.add_seat("seat0");
            Fixture {
                tree,
                views: [v1, v2, v3].into_iter().collect(),
                ws,
                split,
                c1,
                v1,
                c2,
                v2,
                c3,
                v3,
                focus,
                seat,
            }
        }

        fn g(&self) -> G<'_> { G(&self.tree.map, &self.views) }

        fn focus(&mut self, seat: SeatId, node: NodeId) {
            let graph = G(&self.tree.map, &self.views);
            self.focus.set_focus(&graph, seat, node);
        }

        fn stack(&self, seat: SeatId) -> Vec<NodeId> { self.focus.stack(&self.g(), seat) }

        /// Purges like the store does, then removes the subtree.
        fn destroy(&mut self, doomed: NodeId) {
            let scope = doomed.parent(&self.tree.map);
            let graph = G(&self.tree.map, &self.views);
            self.focus.purge(&graph, doomed, scope, scope);
            self.tree.remove(doomed);
        }
    }

    #[test]
    fn set_focus_moves_entry_to_front() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v3);
        assert_eq!(vec![f.v3, f.v2, f.v1], f.stack(f.seat));
        f.focus(f.seat, f.v1);
        assert_eq!(vec![f.v1, f.v3, f.v2], f.stack(f.seat));
        assert_eq!(Some(f.v1), f.focus.focused(&f.g(), f.seat));
    }

    #[test]
    fn activation_follows_front_view() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        assert_eq!(
            vec![Activation { view: f.v1, activated: true }],
            f.focus.take_activations()
        );
        f.focus(f.seat, f.v2);
        assert_eq!(
            vec![
                Activation { view: f.v1, activated: false },
                Activation { view: f.v2, activated: true },
            ],
            f.focus.take_activations()
        );
        f.focus(f.seat, f.v2);
        assert!(f.focus.take_activations().is_empty());
    }

    #[test]
    fn activation_is_or_across_seats() {
        let mut f = Fixture::new();
        let tablet = f.focus.add_seat("tablet");
        f.focus(f.seat, f.v1);
        f.focus(tablet, f.v1);
        f.focus.take_activations();

        // Still focused by the tablet seat, so it stays activated.
        f.focus(f.seat, f.v2);
        assert_eq!(
            vec![Activation { view: f.v2, activated: true }],
            f.focus.take_activations()
        );
        f.focus(tablet, f.v3);
        assert_eq!(
            vec![
                Activation { view: f.v1, activated: false },
                Activation { view: f.v3, activated: true },
            ],
            f.focus.take_activations()
        );
        assert_eq!(
            [f.v2, f.v3].into_iter().collect::<BTreeSet<_>>(),
            f.focus.active_views(&f.g())
        );
    }

    #[test]
    fn focusing_a_split_container_deactivates_views() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v2);
        f.focus.take_activations();
        f.focus(f.seat, f.split);
        assert_eq!(
            vec![Activation { view: f.v2, activated: false }],
            f.focus.take_activations()
        );
    }

    #[test]
    fn get_focus_inactive_scans_within_subtree() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v3);
        f.focus(f.seat, f.v1);
        assert_eq!(Some(f.v1), f.focus.get_focus_inactive(&f.g(), f.seat, f.ws));
        assert_eq!(Some(f.v3), f.focus.get_focus_inactive(&f.g(), f.seat, f.split));
        assert_eq!(Some(f.v2), f.focus.get_focus_inactive(&f.g(), f.seat, f.c2));
        // Read-only.
        assert_eq!(vec![f.v1, f.v3, f.v2], f.stack(f.seat));
        let other = f.focus.add_seat("other");
        assert_eq!(None, f.focus.get_focus_inactive(&f.g(), other, f.ws));
    }

    #[test]
    fn active_child_resolves_direct_child() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v3);
        assert_eq!(Some(f.c3), f.focus.active_child(&f.g(), f.seat, f.split));
        assert_eq!(Some(f.split), f.focus.active_child(&f.g(), f.seat, f.ws));
        assert_eq!(None, f.focus.active_child(&f.g(), f.seat, f.c1));
    }

    #[test]
    fn destroying_front_reassigns_within_parent() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v3);
        f.focus.take_activations();

        f.destroy(f.c3);
        assert_eq!(vec![f.v2, f.v1], f.stack(f.seat));
        assert_eq!(
            vec![Activation { view: f.v2, activated: true }],
            f.focus.take_activations()
        );
    }

    #[test]
    fn destroying_front_falls_back_to_parent() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v1);
        f.destroy(f.c1);
        // Nothing else was ever focused inside the workspace root's scope
        // except v2, which is within it.
        assert_eq!(vec![f.v2], f.stack(f.seat));

        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        f.destroy(f.c1);
        assert_eq!(vec![f.ws], f.stack(f.seat));
    }

    #[test]
    fn destroying_background_entry_keeps_front() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v3);
        f.focus(f.seat, f.v2);
        f.focus(f.seat, f.v1);
        f.focus.take_activations();
        f.destroy(f.split);
        assert_eq!(vec![f.v1], f.stack(f.seat));
        assert!(f.focus.take_activations().is_empty());
    }

    #[test]
    fn detach_moves_focus_but_keeps_entries() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        f.focus(f.seat, f.v3);
        let graph = G(&f.tree.map, &f.views);
        f.focus.handle_detach(&graph, f.c3, Some(f.ws), Some(f.ws));
        assert_eq!(vec![f.v1, f.v3], f.stack(f.seat));
    }

    #[test]
    fn swap_entries_exchanges_positions() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.c2);
        f.focus(f.seat, f.c1);
        f.focus.swap_entries(f.c1, f.c2);
        assert_eq!(vec![f.c2, f.c1], f.stack(f.seat));
    }

    #[test]
    fn stale_handles_are_skipped() {
        let mut f = Fixture::new();
        f.focus(f.seat, f.v1);
        f.focus(f.seat, f.v3);
        // Removed behind the tracker's back.
        f.tree.remove(f.c3);
        assert_eq!(vec![f.v1], f.stack(f.seat));
        assert_eq!(Some(f.v1), f.focus.focused(&f.g(), f.seat));
    }

    #[test]
    fn seats_are_deduplicated_by_name() {
        let mut focus = FocusTracker::default();
        let a = focus.add_seat("seat0");
        let b = focus.add_seat("seat1");
        assert_ne!(a, b);
        assert_eq!(a, focus.add_seat("seat0"));
        assert_eq!(Some("seat1"), focus.seat_name(b));
        assert_eq!(2, focus.seat_ids().count());
    }
}
