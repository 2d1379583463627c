use tracing::info;

use crate::actor::reactor::{Reactor, Result};
use crate::sys::geometry::Rect;

pub struct OutputEventHandler;

impl OutputEventHandler {
    pub fn handle_output_added(reactor: &mut Reactor, name: &str, rect: Rect) -> Result<()> {
        if reactor.store.output_by_name(name).is_some() {
            return Self::handle_output_changed(reactor, name, rect, true);
        }
        let output = reactor.store.create_output(name, rect);
        let adopted = reactor.store.adopt_fallback_workspaces(output)?;
        if reactor.store.workspaces(output).is_empty() {
            let ws_name = reactor.store.next_workspace_name(&reactor.config.settings.workspaces.names);
            let layout = reactor.config.settings.layout.default_layout;
            reactor.store.create_workspace(output, &ws_name, layout)?;
        }
        info!(name, ?rect, adopted, "output added");

        // Seats with nothing to focus yet start on the new output.
        if let Some(ws) = reactor.store.active_workspace(output) {
            for seat in reactor.store.seats() {
                if reactor.store.focused(seat).is_none() {
                    let target = reactor.store.get_focus_inactive(seat, ws).unwrap_or(ws);
                    reactor.store.set_focus(seat, target)?;
                }
            }
        }
        reactor.store.mark_dirty(output);
        Ok(())
    }

    pub fn handle_output_changed(
        reactor: &mut Reactor,
        name: &str,
        rect: Rect,
        enabled: bool,
    ) -> Result<()> {
        let output = reactor.output(name)?;
        let data = reactor.store.data_mut(output)?;
        if let Some(o) = data.output_mut() {
            o.rect = rect;
            o.enabled = enabled;
        }
        data.geometry = rect;
        data.visible = enabled;
        info!(name, ?rect, enabled, "output changed");
        if !enabled {
            // Dirty outputs are only arranged while enabled; hide it now.
            reactor.layout.arrange(&mut reactor.store, output)?;
        }
        reactor.store.mark_dirty(output);
        Ok(())
    }

    pub fn handle_output_removed(reactor: &mut Reactor, name: &str) -> Result<()> {
        let output = reactor.output(name)?;
        reactor.store.remove_output(output)?;
        reactor.transactions.output_removed(output);
        info!(name, "output removed");
        let root = reactor.store.root();
        reactor.store.mark_dirty(root);
        Ok(())
    }
}
