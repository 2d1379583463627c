//! Per-output atomic geometry transactions.
//!
//! At the end of every batch the reactor hands the target rectangle of each
//! visible view on an output to [`TransactionManager::begin`]. Views that need
//! a new size get a configure; the transaction then waits until every one of
//! them has acknowledged, or until its deadline passes, and commits the whole
//! set in one step. Nothing in here reads the clock: every entry point takes
//! the current [`Instant`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::common::collections::{BTreeMap, HashMap, VecDeque};
use crate::common::config::TransactionSettings;
use crate::model::node::SurfaceId;
use crate::model::tx_store::{ConfigureSerial, ViewTxStore};
use crate::model::NodeId;
use crate::sys::geometry::{Rect, SameAs, Size};

const HISTORY_LEN: usize = 32;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Idle,
    Pending,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitReason {
    /// Nothing had to be waited for.
    Immediate,
    AllAcked,
    Timeout,
    /// Atomic commits were switched off.
    NoAtomic,
}

/// What the reactor wants a view to look like after the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub view: NodeId,
    pub surface: SurfaceId,
    pub rect: Rect,
}

/// A configure to send to a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configure {
    pub view: NodeId,
    pub surface: SurfaceId,
    pub serial: ConfigureSerial,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub surface: SurfaceId,
    pub target: Rect,
    pub serial: ConfigureSerial,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub output: NodeId,
    pub started: Instant,
    pub deadline: Instant,
    pub instructions: BTreeMap<NodeId, Instruction>,
    /// Transactions folded into this one without ever committing.
    pub superseded: Vec<TransactionId>,
}

impl Transaction {
    pub fn is_ready(&self) -> bool { self.instructions.values().all(|i| i.ready) }

    pub fn unacked(&self) -> Vec<NodeId> {
        self.instructions.iter().filter(|(_, i)| !i.ready).map(|(&v, _)| v).collect()
    }
}

/// A transaction that reached the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub transaction: TransactionId,
    pub output: NodeId,
    pub reason: CommitReason,
    pub at: Instant,
    pub elapsed: Duration,
    /// Every view applied by this commit, with its new rectangle.
    pub views: Vec<(NodeId, SurfaceId, Rect)>,
    /// Views that never acknowledged and are shown with their old buffer.
    pub stale: Vec<NodeId>,
    /// The output has to be repainted in full.
    pub damaged: bool,
}

/// Result of [`TransactionManager::begin`].
#[derive(Debug, Default)]
pub struct Started {
    pub transaction: TransactionId,
    pub configures: Vec<Configure>,
    pub committed: Option<CommitRecord>,
    /// Transactions of other outputs that were only waiting on views this
    /// one took over.
    pub unblocked: Vec<CommitRecord>,
}

#[derive(Debug)]
enum OutputTx {
    Pending(Transaction),
    Committed(TransactionId),
}

#[derive(Debug)]
pub struct TransactionManager {
    timeout: Duration,
    no_atomic: bool,
    wait_full_deadline: bool,
    store: ViewTxStore,
    outputs: HashMap<NodeId, OutputTx>,
    last_id: TransactionId,
    history: VecDeque<CommitRecord>,
}

impl TransactionManager {
    pub fn new(settings: &TransactionSettings) -> Self {
        TransactionManager {
            timeout: settings.timeout(),
            no_atomic: settings.no_atomic,
            wait_full_deadline: settings.wait_full_deadline,
            store: ViewTxStore::new(),
            outputs: HashMap::default(),
            last_id: TransactionId::default(),
            history: VecDeque::new(),
        }
    }

    pub fn set_settings(&mut self, settings: &TransactionSettings) {
        self.timeout = settings.timeout();
        self.no_atomic = settings.no_atomic;
        self.wait_full_deadline = settings.wait_full_deadline;
    }

    /// Applies every transaction as soon as it is built.
    pub fn set_no_atomic(&mut self, enabled: bool) { self.no_atomic = enabled; }

    /// Holds every transaction until its deadline, acknowledged or not.
    pub fn set_wait_full_deadline(&mut self, enabled: bool) { self.wait_full_deadline = enabled; }

    pub fn timeout(&self) -> Duration { self.timeout }

    pub fn state(&self, output: NodeId) -> TxState {
        match self.outputs.get(&output) {
            None => TxState::Idle,
            Some(OutputTx::Pending(_)) => TxState::Pending,
            Some(OutputTx::Committed(_)) => TxState::Committed,
        }
    }

    pub fn pending(&self, output: NodeId) -> Option<&Transaction> {
        match self.outputs.get(&output)? {
            OutputTx::Pending(tx) => Some(tx),
            OutputTx::Committed(_) => None,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &CommitRecord> + '_ { self.history.iter() }

    pub fn committed_rect(&self, view: NodeId) -> Option<Rect> { self.store.committed(&view) }

    /// Earliest deadline among pending transactions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.outputs
            .values()
            .filter_map(|tx| match tx {
                OutputTx::Pending(tx) => Some(tx.deadline),
                OutputTx::Committed(_) => None,
            })
            .min()
    }

    /// Starts a transaction moving the views of `output` to `targets`, which
    /// names every view the output shows.
    ///
    /// A transaction already pending on the output is superseded: its
    /// instructions for views still in `targets` carry over, and it never
    /// commits on its own. Views that another output was waiting on leave
    /// that output's transaction.
    pub fn begin(&mut self, output: NodeId, targets: Vec<Target>, now: Instant) -> Started {
        self.last_id = self.last_id.next();
        let id = self.last_id;
        let mut instructions = BTreeMap::new();
        let mut superseded = Vec::new();
        if let Some(OutputTx::Pending(old)) = self.outputs.remove(&output) {
            debug!(?output, old = ?old.id, new = ?id, "superseding pending transaction");
            superseded.extend(old.superseded);
            superseded.push(old.id);
            instructions = old.instructions;
            instructions.retain(|view, _| targets.iter().any(|t| t.view == *view));
        }

        let mut unblocked = Vec::new();
        for target in &targets {
            if let Some(other) = self.pending_output_of(target.view) {
                debug!(view = ?target.view, from = ?other, to = ?output, "view changed output");
                unblocked.extend(self.release(other, target.view, now));
            }
        }

        let mut configures = Vec::new();
        for Target { view, surface, rect } in targets {
            let outstanding = self.store.target(&view);
            if outstanding.is_none() && self.store.committed(&view) == Some(rect) {
                instructions.remove(&view);
                continue;
            }
            if let Some(carried) = instructions.get_mut(&view)
                && outstanding.is_some_and(|t| t.size.same_as(rect.size))
            {
                // Same size already on its way; only the position moves.
                carried.target = rect;
                self.store.insert(view, carried.serial, rect);
                continue;
            }
            let ready = outstanding.is_none()
                && self.store.committed(&view).is_some_and(|c| c.size.same_as(rect.size));
            let serial = if ready {
                self.store.last_serial(&view)
            } else {
                self.store.next_serial(view)
            };
            self.store.insert(view, serial, rect);
            if !ready {
                configures.push(Configure { view, surface, serial, size: rect.size });
            }
            instructions.insert(view, Instruction { surface, target: rect, serial, ready });
        }

        let tx = Transaction {
            id,
            output,
            started: now,
            deadline: now + self.timeout,
            instructions,
            superseded,
        };
        trace!(
            ?output,
            ?id,
            views = tx.instructions.len(),
            configures = configures.len(),
            "began transaction"
        );

        let reason = if tx.instructions.is_empty() {
            Some(CommitReason::Immediate)
        } else if self.no_atomic {
            Some(CommitReason::NoAtomic)
        } else if tx.is_ready() && !self.wait_full_deadline {
            Some(CommitReason::AllAcked)
        } else {
            None
        };
        let committed = match reason {
            Some(reason) => Some(self.commit(tx, reason, now)),
            None => {
                self.outputs.insert(output, OutputTx::Pending(tx));
                None
            }
        };
        Started { transaction: id, configures, committed, unblocked }
    }

    /// Records a client's acknowledgement. It matches the pending instruction
    /// for `view` by serial when the client reports one, and by size
    /// otherwise.
    pub fn ack(
        &mut self,
        view: NodeId,
        serial: Option<ConfigureSerial>,
        size: Size,
        now: Instant,
    ) -> Option<CommitRecord> {
        let output = self.pending_output_of(view)?;
        let Some(OutputTx::Pending(tx)) = self.outputs.get_mut(&output) else { return None };
        let instruction = tx.instructions.get_mut(&view)?;
        let matches = match serial {
            Some(serial) => serial == instruction.serial,
            None => instruction.target.size.same_as(size),
        };
        if !matches {
            trace!(?view, ?serial, ?size, expected = ?instruction.serial, "ignoring stale ack");
            return None;
        }
        instruction.ready = true;
        if !tx.is_ready() || self.wait_full_deadline {
            return None;
        }
        self.commit_pending(output, CommitReason::AllAcked, now)
    }

    /// Drops a destroyed view from whatever transaction it was part of. If it
    /// was the last one being waited for, that transaction commits.
    pub fn view_destroyed(&mut self, view: NodeId, now: Instant) -> Option<CommitRecord> {
        let output = self.pending_output_of(view);
        self.store.remove(&view);
        self.release(output?, view, now)
    }

    /// Forgets an output and whatever was pending on it.
    pub fn output_removed(&mut self, output: NodeId) {
        if let Some(OutputTx::Pending(tx)) = self.outputs.remove(&output) {
            debug!(?output, transaction = ?tx.id, "dropped transaction of removed output");
            for view in tx.instructions.keys() {
                self.store.remove(view);
            }
        }
    }

    /// Commits every transaction whose deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<CommitRecord> {
        let expired: Vec<NodeId> = self
            .outputs
            .iter()
            .filter_map(|(&output, tx)| match tx {
                OutputTx::Pending(tx) if tx.deadline <= now => Some(output),
                _ => None,
            })
            .collect();
        let mut commits = Vec::new();
        for output in expired {
            let Some(tx) = self.pending(output) else { continue };
            let reason = if tx.is_ready() {
                CommitReason::AllAcked
            } else {
                info!(
                    ?output,
                    transaction = ?tx.id,
                    unacked = ?tx.unacked(),
                    "transaction timed out"
                );
                CommitReason::Timeout
            };
            commits.extend(self.commit_pending(output, reason, now));
        }
        commits
    }

    /// Takes `view` out of the transaction pending on `output`, committing
    /// it if nothing else is outstanding.
    fn release(&mut self, output: NodeId, view: NodeId, now: Instant) -> Option<CommitRecord> {
        let Some(OutputTx::Pending(tx)) = self.outputs.get_mut(&output) else { return None };
        tx.instructions.remove(&view);
        debug!(?view, transaction = ?tx.id, "view left transaction");
        if !tx.is_ready() || self.wait_full_deadline {
            return None;
        }
        self.commit_pending(output, CommitReason::AllAcked, now)
    }

    fn pending_output_of(&self, view: NodeId) -> Option<NodeId> {
        self.outputs.iter().find_map(|(&output, tx)| match tx {
            OutputTx::Pending(tx) if tx.instructions.contains_key(&view) => Some(output),
            _ => None,
        })
    }

    fn commit_pending(
        &mut self,
        output: NodeId,
        reason: CommitReason,
        now: Instant,
    ) -> Option<CommitRecord> {
        match self.outputs.remove(&output)? {
            OutputTx::Pending(tx) => Some(self.commit(tx, reason, now)),
            committed => {
                self.outputs.insert(output, committed);
                None
            }
        }
    }

    fn commit(&mut self, tx: Transaction, reason: CommitReason, now: Instant) -> CommitRecord {
        let stale = tx.unacked();
        let mut views = Vec::with_capacity(tx.instructions.len());
        for (&view, instruction) in &tx.instructions {
            self.store.set_committed(view, instruction.target);
            views.push((view, instruction.surface, instruction.target));
        }
        let record = CommitRecord {
            transaction: tx.id,
            output: tx.output,
            reason,
            at: now,
            elapsed: now.saturating_duration_since(tx.started),
            views,
            damaged: !stale.is_empty(),
            stale,
        };
        debug!(output = ?tx.output, transaction = ?tx.id, ?reason, "committed");
        self.outputs.insert(tx.output, OutputTx::Committed(tx.id));
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());
        record
    }
}
