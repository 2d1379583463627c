//! The single-threaded event loop that owns the tree.
//!
//! Every backend notification, user command and timer tick arrives as an
//! [`Event`] and runs to completion before the next one is looked at. Work
//! that touches geometry only marks nodes dirty; once the event is handled,
//! the dirty outputs are arranged and handed to the transaction manager in
//! one go, so one event never produces more than one transaction per output.

mod error;
mod events;
mod query;
mod replay;
pub mod transaction_manager;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

use std::time::Instant;

pub use error::{ReactorError, Result};
use events::command::CommandEventHandler;
use events::output::OutputEventHandler;
use events::view::ViewEventHandler;
pub use query::{Query, TransactionInfo, WorkspaceInfo};
pub use replay::{Record, replay};
use serde::{Deserialize, Serialize};
use tokio::time::sleep_until;
use tracing::{debug, debug_span, warn};
use transaction_manager::{CommitRecord, Target, TransactionId, TransactionManager};

use crate::actor::{self, Receiver};
use crate::common::collections::HashMap;
use crate::common::config::Config;
use crate::layout_engine::{LayoutCommand, LayoutEngine};
use crate::model::focus::Activation;
use crate::model::node::SurfaceId;
use crate::model::snapshot::walk;
use crate::model::tx_store::ConfigureSerial;
use crate::model::{NodeId, NodeStore, SeatId};
use crate::sys::geometry::{Rect, Size};

/// Something the reactor has to react to.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    OutputAdded {
        name: String,
        rect: Rect,
    },
    /// An output changed mode or position, or was switched on or off.
    OutputChanged {
        name: String,
        rect: Rect,
        enabled: bool,
    },
    OutputRemoved {
        name: String,
    },
    ViewMapped {
        surface: SurfaceId,
        title: String,
        app_id: Option<String>,
        natural: Size,
        /// The client asked to float, e.g. a dialog.
        floating: bool,
    },
    ViewUnmapped {
        surface: SurfaceId,
    },
    ConfigureAck {
        surface: SurfaceId,
        serial: Option<ConfigureSerial>,
        size: Size,
    },
    /// A seat clicked or typed into a surface.
    Input {
        seat: Option<String>,
        surface: SurfaceId,
    },
    Command {
        seat: Option<String>,
        command: Command,
    },
    TransactionTimeout,
    #[serde(skip)]
    Query(Query),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Layout(LayoutCommand),
    /// Switches to the named workspace, creating it on the focused output.
    Workspace(String),
    MoveToWorkspace(String),
    MoveToScratchpad,
    ScratchpadShow,
    Close,
    ReloadConfig(Box<Config>),
    Debug(DebugCommand),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DebugCommand {
    NoAtomic(bool),
    WaitFullDeadline(bool),
    DumpTree,
}

/// Traffic for the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Configure {
        surface: SurfaceId,
        serial: ConfigureSerial,
        size: Size,
    },
    SetActivated {
        surface: SurfaceId,
        activated: bool,
    },
    SetVisible {
        surface: SurfaceId,
        visible: bool,
    },
    /// Show the committed state of an output.
    Present {
        output: String,
        transaction: TransactionId,
        views: Vec<(SurfaceId, Rect)>,
        damaged: bool,
    },
    Close {
        surface: SurfaceId,
    },
}

pub struct Reactor {
    config: Config,
    store: NodeStore,
    layout: LayoutEngine,
    transactions: TransactionManager,
    surfaces: HashMap<SurfaceId, NodeId>,
    /// Visibility last reported to the backend, per view.
    shown: HashMap<NodeId, bool>,
    default_seat: SeatId,
    requests: actor::Sender<Request>,
    record: Record,
}

impl Reactor {
    pub fn new(config: Config, mut record: Record, requests: actor::Sender<Request>) -> Reactor {
        let mut store = NodeStore::new();
        for seat in &config.seats {
            store.add_seat(seat);
        }
        let default_seat = match store.seat(config.default_seat()) {
            Some(seat) => seat,
            None => store.add_seat(config.default_seat()),
        };
        record.start(&config);
        Reactor {
            layout: LayoutEngine::new(&config.settings),
            transactions: TransactionManager::new(&config.settings.transactions),
            config,
            store,
            surfaces: HashMap::default(),
            shown: HashMap::default(),
            default_seat,
            requests,
            record,
        }
    }

    pub fn store(&self) -> &NodeStore { &self.store }

    pub fn config(&self) -> &Config { &self.config }

    /// Handles events until the channel closes, committing transactions as
    /// their deadlines pass.
    pub async fn run(mut self, mut events: Receiver<Event>) {
        loop {
            let deadline = self.transactions.next_deadline();
            let timer = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline.into()).await,
                    None => std::future::pending().await,
                }
            };
            // The runtime's clock, so that paused test time drives deadlines.
            tokio::select! {
                event = events.recv() => {
                    let Some((span, event)) = event else { break };
                    let _guard = span.enter();
                    self.handle_event_at(event, tokio::time::Instant::now().into_std());
                }
                () = timer => {
                    let now = tokio::time::Instant::now().into_std();
                    self.handle_event_at(Event::TransactionTimeout, now);
                }
            }
        }
        debug!("event channel closed");
    }

    pub fn handle_event(&mut self, event: Event) { self.handle_event_at(event, Instant::now()) }

    pub fn handle_event_at(&mut self, event: Event, now: Instant) {
        let _span = debug_span!("handle_event").entered();
        if !matches!(event, Event::Query(_)) {
            self.record.on_event(&event);
            debug!(?event);
        }
        let result = match event {
            Event::OutputAdded { name, rect } => {
                OutputEventHandler::handle_output_added(self, &name, rect)
            }
            Event::OutputChanged { name, rect, enabled } => {
                OutputEventHandler::handle_output_changed(self, &name, rect, enabled)
            }
            Event::OutputRemoved { name } => OutputEventHandler::handle_output_removed(self, &name),
            Event::ViewMapped { surface, title, app_id, natural, floating } => {
                ViewEventHandler::handle_view_mapped(self, surface, title, app_id, natural, floating)
            }
            Event::ViewUnmapped { surface } => ViewEventHandler::handle_view_unmapped(self, surface),
            Event::ConfigureAck { surface, serial, size } => {
                ViewEventHandler::handle_configure_ack(self, surface, serial, size, now)
            }
            Event::Input { seat, surface } => {
                ViewEventHandler::handle_input(self, seat.as_deref(), surface)
            }
            Event::Command { seat, command } => {
                CommandEventHandler::handle_command(self, seat.as_deref(), command)
            }
            Event::TransactionTimeout => Ok(()),
            Event::Query(query) => {
                self.handle_query(query);
                return;
            }
        };
        if let Err(err) = result {
            warn!(%err, "event failed");
        }
        self.finish_batch(now);
    }

    /// Flushes everything the event left behind: expired transactions,
    /// destroyed views, activation changes, and finally one transaction per
    /// dirty output.
    fn finish_batch(&mut self, now: Instant) {
        for record in self.transactions.poll(now) {
            self.present(record);
        }
        for view in self.store.take_destroyed_views() {
            self.shown.remove(&view);
            if let Some(record) = self.transactions.view_destroyed(view, now) {
                self.present(record);
            }
        }
        self.send_activations();

        let dirty = self.store.take_dirty();
        if dirty.is_empty() {
            return;
        }
        let outputs = match self.layout.arrange_dirty(&mut self.store, dirty) {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!(%err, "arrange failed");
                return;
            }
        };
        self.sync_visibility();
        for output in outputs {
            self.begin_transaction(output, now);
        }
    }

    fn send_activations(&mut self) {
        for Activation { view, activated } in self.store.take_activations() {
            let Some(surface) = self.store.get(view).and_then(|d| d.view()).map(|v| v.surface)
            else {
                continue;
            };
            self.requests.send(Request::SetActivated { surface, activated });
            // Tabs and stacks show whatever is focused; splits show everything.
            let graph = self.store.graph();
            let in_group = view
                .ancestors(self.store.map())
                .any(|a| graph.container(a).is_some_and(|c| c.layout.is_group()));
            if let Some(ws) = graph.workspace_of(view).filter(|_| in_group) {
                self.store.mark_dirty(ws);
            }
        }
    }

    /// Tells the backend about views that appeared or disappeared, including
    /// ones that left every output (scratchpad, parked workspaces).
    fn sync_visibility(&mut self) {
        let graph = self.store.graph();
        let root = self.store.root();
        let changes: Vec<(NodeId, SurfaceId, bool)> = self
            .store
            .views()
            .map(|(id, view)| {
                // Parked workspaces hang off the detached fallback output.
                let on_screen = graph.output_of(id).is_some_and(|o| graph.parent(o) == Some(root));
                let visible = on_screen
                    && graph.get(id).is_some_and(|d| d.visible && !d.geometry.is_degenerate());
                (id, view.surface, visible)
            })
            .filter(|&(id, _, visible)| self.shown.get(&id) != Some(&visible))
            .collect();
        for (id, surface, visible) in changes {
            self.shown.insert(id, visible);
            self.requests.send(Request::SetVisible { surface, visible });
        }
    }

    fn begin_transaction(&mut self, output: NodeId, now: Instant) {
        let targets: Vec<Target> = walk(&self.store, output)
            .filter(|entry| entry.data.visible && !entry.data.geometry.is_degenerate())
            .filter_map(|entry| {
                let view = entry.data.view()?;
                Some(Target {
                    view: entry.id,
                    surface: view.surface,
                    rect: entry.data.geometry,
                })
            })
            .collect();
        let started = self.transactions.begin(output, targets, now);
        for configure in started.configures {
            self.requests.send(Request::Configure {
                surface: configure.surface,
                serial: configure.serial,
                size: configure.size,
            });
        }
        for record in started.unblocked.into_iter().chain(started.committed) {
            self.present(record);
        }
    }

    fn present(&mut self, record: CommitRecord) {
        let Some(output) = self.store.get(record.output).and_then(|d| d.output()) else {
            debug!(output = ?record.output, "committed transaction for a removed output");
            return;
        };
        self.requests.send(Request::Present {
            output: output.name.clone(),
            transaction: record.transaction,
            views: record.views.iter().map(|&(_, surface, rect)| (surface, rect)).collect(),
            damaged: record.damaged,
        });
    }

    // Lookups shared by the handlers.

    fn seat(&self, name: Option<&str>) -> Result<SeatId> {
        match name {
            None => Ok(self.default_seat),
            Some(name) => self.store.seat(name).ok_or_else(|| ReactorError::UnknownSeat(name.to_owned())),
        }
    }

    fn view(&self, surface: SurfaceId) -> Result<NodeId> {
        self.surfaces.get(&surface).copied().ok_or(ReactorError::UnknownSurface(surface))
    }

    fn output(&self, name: &str) -> Result<NodeId> {
        self.store.output_by_name(name).ok_or_else(|| ReactorError::UnknownOutput(name.to_owned()))
    }

    /// The workspace `seat` is on: that of its focused node, or else the
    /// active workspace of the first output.
    fn focused_workspace(&self, seat: SeatId) -> Option<NodeId> {
        self.store
            .focused(seat)
            .and_then(|f| self.store.graph().workspace_of(f))
            .or_else(|| {
                let output = self.store.outputs().into_iter().next()?;
                self.store.active_workspace(output)
            })
    }
}
