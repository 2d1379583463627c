use std::time::Instant;

use tracing::{debug, info, trace};

use crate::actor::reactor::{Reactor, ReactorError, Result};
use crate::model::node::{SurfaceId, ViewData};
use crate::model::tx_store::ConfigureSerial;
use crate::model::NodeId;
use crate::sys::geometry::Size;

pub struct ViewEventHandler;

impl ViewEventHandler {
    /// Places a newly mapped view next to what the default seat has focused
    /// and focuses it for every seat looking at that workspace.
    pub fn handle_view_mapped(
        reactor: &mut Reactor,
        surface: SurfaceId,
        title: String,
        app_id: Option<String>,
        natural: Size,
        floating: bool,
    ) -> Result<()> {
        if reactor.surfaces.contains_key(&surface) {
            debug!(?surface, "surface mapped twice");
            return Ok(());
        }
        let seat = reactor.default_seat;
        let ws = reactor.focused_workspace(seat).ok_or(ReactorError::NoFocus(seat))?;
        let (leaf, view) = reactor.store.create_view(ViewData {
            surface,
            title,
            app_id,
            natural,
            border: reactor.config.settings.layout.border,
            activated: false,
        });
        reactor.surfaces.insert(surface, view);

        let (parent, index) = Self::insertion_point(reactor, ws)?;
        reactor.store.add_child(parent, leaf, index)?;
        if floating {
            reactor.layout.toggle_floating(&mut reactor.store, leaf)?;
        }

        for seat in reactor.store.seats() {
            let looking = match reactor.store.focused(seat) {
                Some(f) => reactor.store.graph().workspace_of(f) == Some(ws),
                None => true,
            };
            if looking {
                reactor.store.set_focus(seat, view)?;
            }
        }
        reactor.store.mark_dirty(ws);
        info!(?surface, ?view, "view mapped");
        Ok(())
    }

    /// Right after the focused tiled container of `ws`, or at the end of its
    /// tiling root.
    fn insertion_point(reactor: &Reactor, ws: NodeId) -> Result<(NodeId, Option<usize>)> {
        let graph = reactor.store.graph();
        let anchor = reactor
            .store
            .focused(reactor.default_seat)
            .filter(|&f| graph.workspace_of(f) == Some(ws))
            .and_then(|f| graph.movable(f))
            .filter(|&m| !graph.is_floating(m));
        if let Some(anchor) = anchor
            && let Some(parent) = graph.parent(anchor)
        {
            let index = graph.children(parent).position(|c| c == anchor).map(|i| i + 1);
            return Ok((parent, index));
        }
        Ok((reactor.store.tiling_root(ws)?, None))
    }

    pub fn handle_view_unmapped(reactor: &mut Reactor, surface: SurfaceId) -> Result<()> {
        let view = reactor.view(surface)?;
        reactor.surfaces.remove(&surface);
        let ws = reactor.store.graph().workspace_of(view);
        reactor.store.destroy(view, false)?;
        info!(?surface, ?view, "view unmapped");

        // A hidden workspace left empty goes away.
        if let Some(ws) = ws
            && reactor.store.is_workspace_empty(ws)
            && reactor.config.settings.workspaces.destroy_empty_on_leave
            && !Self::is_shown(reactor, ws)
        {
            reactor.store.destroy(ws, false)?;
        }
        Ok(())
    }

    fn is_shown(reactor: &Reactor, ws: NodeId) -> bool {
        reactor
            .store
            .parent(ws)
            .is_some_and(|output| reactor.store.active_workspace(output) == Some(ws))
    }

    pub fn handle_configure_ack(
        reactor: &mut Reactor,
        surface: SurfaceId,
        serial: Option<ConfigureSerial>,
        size: Size,
        now: Instant,
    ) -> Result<()> {
        let view = reactor.view(surface)?;
        trace!(?surface, ?serial, ?size, "configure ack");
        if let Some(record) = reactor.transactions.ack(view, serial, size, now) {
            reactor.present(record);
        }
        Ok(())
    }

    /// Click-to-focus.
    pub fn handle_input(reactor: &mut Reactor, seat: Option<&str>, surface: SurfaceId) -> Result<()> {
        let seat = reactor.seat(seat)?;
        let view = reactor.view(surface)?;
        if reactor.store.focused(seat) != Some(view) {
            reactor.store.set_focus(seat, view)?;
        }
        Ok(())
    }
}
