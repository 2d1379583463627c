use tracing::{info, warn};

use crate::actor::reactor::{Command, DebugCommand, Reactor, ReactorError, Request, Result};
use crate::common::config::Config;
use crate::layout_engine::LayoutCommand;
use crate::model::snapshot::walk;
use crate::model::{NodeId, SeatId};

pub struct CommandEventHandler;

impl CommandEventHandler {
    pub fn handle_command(reactor: &mut Reactor, seat: Option<&str>, command: Command) -> Result<()> {
        info!(?command);
        let seat = reactor.seat(seat)?;
        match command {
            Command::Layout(cmd) => Self::handle_command_layout(reactor, seat, cmd),
            Command::Workspace(name) => Self::handle_switch_workspace(reactor, seat, &name),
            Command::MoveToWorkspace(name) => Self::handle_move_to_workspace(reactor, seat, &name),
            Command::MoveToScratchpad => {
                let focused = Self::focused(reactor, seat)?;
                let ws = reactor.store.graph().workspace_of(focused);
                reactor.store.move_to_scratchpad(focused)?;
                if let Some(ws) = ws {
                    reactor.store.mark_dirty(ws);
                }
                Ok(())
            }
            Command::ScratchpadShow => Self::handle_scratchpad_show(reactor, seat),
            Command::Close => {
                let focused = Self::focused(reactor, seat)?;
                let surfaces: Vec<_> = walk(&reactor.store, focused)
                    .filter_map(|entry| entry.data.view().map(|v| v.surface))
                    .collect();
                for surface in surfaces {
                    reactor
                        .requests
                        .try_send(Request::Close { surface })
                        .map_err(|_| ReactorError::BackendGone)?;
                }
                Ok(())
            }
            Command::ReloadConfig(config) => Self::handle_reload_config(reactor, *config),
            Command::Debug(cmd) => {
                Self::handle_command_debug(reactor, cmd);
                Ok(())
            }
        }
    }

    fn focused(reactor: &Reactor, seat: SeatId) -> Result<NodeId> {
        reactor.store.focused(seat).ok_or(ReactorError::NoFocus(seat))
    }

    pub fn handle_command_layout(reactor: &mut Reactor, seat: SeatId, cmd: LayoutCommand) -> Result<()> {
        let focused = Self::focused(reactor, seat)?;
        let before = reactor.store.graph().workspace_of(focused);
        let engine = &reactor.layout;
        let store = &mut reactor.store;
        match cmd {
            LayoutCommand::MoveFocus(direction) => {
                if let Some(target) = engine.focus_in_direction(store, seat, direction) {
                    store.set_focus(seat, target)?;
                }
                // Geometry only changes through activation, for tabs and stacks.
                return Ok(());
            }
            LayoutCommand::MoveNode(direction) => {
                engine.move_node(store, focused, direction)?;
            }
            LayoutCommand::SwapNode(direction) => {
                engine.swap_in_direction(store, focused, direction)?;
            }
            LayoutCommand::Resize { edge, delta } => {
                engine.resize(store, focused, delta, edge)?;
            }
            LayoutCommand::SetLayout(kind) => {
                engine.set_layout(store, focused, kind)?;
            }
            LayoutCommand::Split(orientation) => {
                engine.split(store, focused, orientation)?;
            }
            LayoutCommand::ToggleSplit => {
                engine.toggle_split(store, focused)?;
            }
            LayoutCommand::ToggleFloating => {
                engine.toggle_floating(store, focused)?;
            }
            LayoutCommand::ToggleFullscreen => {
                let graph = store.graph();
                let node = graph.movable(focused).unwrap_or(focused);
                let on = graph.container(node).is_some_and(|c| c.fullscreen);
                store.set_fullscreen(node, !on)?;
            }
        }
        let after = store.graph().workspace_of(focused);
        for ws in [before, after].into_iter().flatten() {
            store.mark_dirty(ws);
        }
        Ok(())
    }

    fn handle_switch_workspace(reactor: &mut Reactor, seat: SeatId, name: &str) -> Result<()> {
        let current = reactor.focused_workspace(seat);
        let ws = match reactor.store.workspace_by_name(name) {
            Some(ws) => ws,
            None => {
                let output = current
                    .and_then(|ws| reactor.store.parent(ws))
                    .or_else(|| reactor.store.outputs().into_iter().next())
                    .ok_or(ReactorError::NoFocus(seat))?;
                let layout = reactor.config.settings.layout.default_layout;
                reactor.store.create_workspace(output, name, layout)?
            }
        };
        if Some(ws) == current {
            return Ok(());
        }
        let previous = reactor.store.set_active_workspace(ws)?;
        let target = reactor.store.get_focus_inactive(seat, ws).unwrap_or(ws);
        reactor.store.set_focus(seat, target)?;
        reactor.store.mark_dirty(ws);
        info!(name, "switched workspace");

        if reactor.config.settings.workspaces.destroy_empty_on_leave {
            let mut left = vec![];
            left.extend(current);
            left.extend(previous.filter(|&p| Some(p) != current));
            for old in left {
                Self::destroy_if_abandoned(reactor, old)?;
            }
        }
        Ok(())
    }

    /// Destroys `ws` if it is empty, not shown, and no seat is on it.
    fn destroy_if_abandoned(reactor: &mut Reactor, ws: NodeId) -> Result<()> {
        let store = &reactor.store;
        if !store.contains(ws) || !store.is_workspace_empty(ws) {
            return Ok(());
        }
        let shown = store.parent(ws).is_some_and(|o| store.active_workspace(o) == Some(ws));
        let occupied = store
            .seats()
            .into_iter()
            .filter_map(|seat| store.focused(seat))
            .any(|f| store.graph().workspace_of(f) == Some(ws));
        if shown || occupied {
            return Ok(());
        }
        reactor.store.destroy(ws, false)?;
        Ok(())
    }

    fn handle_move_to_workspace(reactor: &mut Reactor, seat: SeatId, name: &str) -> Result<()> {
        let focused = Self::focused(reactor, seat)?;
        let current = reactor.store.graph().workspace_of(focused);
        let ws = match reactor.store.workspace_by_name(name) {
            Some(ws) => ws,
            None => {
                let output = current
                    .and_then(|ws| reactor.store.parent(ws))
                    .ok_or(ReactorError::NoFocus(seat))?;
                let layout = reactor.config.settings.layout.default_layout;
                reactor.store.create_workspace(output, name, layout)?
            }
        };
        reactor.store.move_to_workspace(focused, ws)?;
        for ws in [current, Some(ws)].into_iter().flatten() {
            reactor.store.mark_dirty(ws);
        }
        Ok(())
    }

    /// Shows the next hidden scratchpad window on the seat's workspace, or
    /// hides the one shown there if it has focus.
    fn handle_scratchpad_show(reactor: &mut Reactor, seat: SeatId) -> Result<()> {
        let ws = reactor.focused_workspace(seat).ok_or(ReactorError::NoFocus(seat))?;
        if let Some(shown) = reactor.store.shown_scratchpad_on(ws) {
            let has_focus = reactor
                .store
                .focused(seat)
                .is_some_and(|f| f.is_within(shown, reactor.store.map()));
            if has_focus {
                reactor.store.hide_scratchpad(shown)?;
            } else {
                reactor.store.set_focus(seat, shown)?;
            }
        } else if let Some(next) = reactor.store.next_hidden_scratchpad() {
            let rect = reactor.layout.scratchpad_rect(&reactor.store, next, ws)?;
            reactor.store.show_scratchpad(next, ws, rect)?;
            reactor.store.set_focus(seat, next)?;
        } else {
            info!("scratchpad is empty");
            return Ok(());
        }
        reactor.store.mark_dirty(ws);
        Ok(())
    }

    fn handle_reload_config(reactor: &mut Reactor, config: Config) -> Result<()> {
        let issues = config.validate();
        if !issues.is_empty() {
            for issue in &issues {
                warn!(%issue, "config rejected");
            }
            return Ok(());
        }
        for seat in &config.seats {
            if reactor.store.seat(seat).is_none() {
                reactor.store.add_seat(seat);
            }
        }
        reactor.layout.set_settings(&config.settings);
        reactor.transactions.set_settings(&config.settings.transactions);
        reactor.config = config;
        let root = reactor.store.root();
        reactor.store.mark_dirty(root);
        info!("config reloaded");
        Ok(())
    }

    pub fn handle_command_debug(reactor: &mut Reactor, cmd: DebugCommand) {
        match cmd {
            DebugCommand::NoAtomic(enabled) => reactor.transactions.set_no_atomic(enabled),
            DebugCommand::WaitFullDeadline(enabled) => {
                reactor.transactions.set_wait_full_deadline(enabled)
            }
            DebugCommand::DumpTree => {
                let root = reactor.store.root();
                info!("tree:\n{}", reactor.store.draw_tree(root));
            }
        }
    }
}
