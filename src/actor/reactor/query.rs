use serde::Serialize;
use tokio::sync::oneshot;

use super::Reactor;
use super::transaction_manager::TxState;
use crate::model::snapshot::NodeSnapshot;
use crate::sys::geometry::Rect;

/// Read-only requests. Each is answered from the state between two events,
/// so no transaction can commit halfway through building an answer.
#[derive(Debug)]
pub enum Query {
    Tree(oneshot::Sender<Option<NodeSnapshot>>),
    Workspaces(oneshot::Sender<Vec<WorkspaceInfo>>),
    Focused {
        seat: Option<String>,
        response: oneshot::Sender<Option<NodeSnapshot>>,
    },
    Transactions(oneshot::Sender<Vec<TransactionInfo>>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WorkspaceInfo {
    pub name: String,
    pub output: Option<String>,
    pub rect: Rect,
    pub visible: bool,
    pub focused: bool,
    pub windows: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransactionInfo {
    pub output: String,
    pub state: TxState,
    pub waiting_on: usize,
}

impl Reactor {
    pub(super) fn handle_query(&mut self, query: Query) {
        match query {
            Query::Tree(response) => {
                let _ = response.send(NodeSnapshot::capture(&self.store, self.store.root()));
            }
            Query::Workspaces(response) => {
                let _ = response.send(self.workspace_infos());
            }
            Query::Focused { seat, response } => {
                let focused = self
                    .seat(seat.as_deref())
                    .ok()
                    .and_then(|seat| self.store.focused(seat))
                    .and_then(|node| NodeSnapshot::capture(&self.store, node));
                let _ = response.send(focused);
            }
            Query::Transactions(response) => {
                let _ = response.send(self.transaction_infos());
            }
        }
    }

    fn workspace_infos(&self) -> Vec<WorkspaceInfo> {
        let store = &self.store;
        let focused_ws = self.focused_workspace(self.default_seat);
        store
            .outputs()
            .into_iter()
            .flat_map(|output| {
                let out = store.get(output).and_then(|d| d.output());
                let name = out.map(|o| o.name.clone());
                let active = out.and_then(|o| o.active_workspace);
                store.workspaces(output).into_iter().filter_map(move |ws| {
                    let data = store.get(ws)?;
                    let windows = store
                        .views()
                        .filter(|&(v, _)| store.graph().workspace_of(v) == Some(ws))
                        .count();
                    Some(WorkspaceInfo {
                        name: data.name()?.to_owned(),
                        output: name.clone(),
                        rect: data.geometry,
                        visible: active == Some(ws),
                        focused: focused_ws == Some(ws),
                        windows,
                    })
                })
            })
            .collect()
    }

    fn transaction_infos(&self) -> Vec<TransactionInfo> {
        self.store
            .outputs()
            .into_iter()
            .filter_map(|output| {
                let name = self.store.get(output)?.output()?.name.clone();
                Some(TransactionInfo {
                    output: name,
                    state: self.transactions.state(output),
                    waiting_on: self.transactions.pending(output).map_or(0, |tx| tx.unacked().len()),
                })
            })
            .collect()
    }
}
