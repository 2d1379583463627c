use serde::{Deserialize, Serialize};

use super::tree::NodeId;
use crate::common::collections::HashMap;
use crate::sys::geometry::Rect;

/// A per-view counter bumped every time a configure is sent.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigureSerial(pub u32);

impl ConfigureSerial {
    pub fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TxRecord {
    pub serial: ConfigureSerial,
    /// Rectangle of the last configure still waiting for an ack.
    pub target: Option<Rect>,
    /// Rectangle the compositor last presented for this view.
    pub committed: Option<Rect>,
}

/// Per-view configure bookkeeping shared by all transactions.
#[derive(Clone, Default, Debug)]
pub struct ViewTxStore(HashMap<NodeId, TxRecord>);

impl ViewTxStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, view: NodeId, serial: ConfigureSerial, target: Rect) {
        let record = self.0.entry(view).or_default();
        record.serial = serial;
        record.target = Some(target);
    }

    pub fn get(&self, view: &NodeId) -> Option<TxRecord> { self.0.get(view).copied() }

    pub fn remove(&mut self, view: &NodeId) { self.0.remove(view); }

    /// Allocates the next serial for `view` and forgets any pending target.
    pub fn next_serial(&mut self, view: NodeId) -> ConfigureSerial {
        let record = self.0.entry(view).or_default();
        record.serial = record.serial.next();
        record.target = None;
        record.serial
    }

    pub fn last_serial(&self, view: &NodeId) -> ConfigureSerial {
        self.get(view).map(|record| record.serial).unwrap_or_default()
    }

    pub fn target(&self, view: &NodeId) -> Option<Rect> { self.get(view)?.target }

    /// Records the rectangle applied on commit; the pending target is done.
    pub fn set_committed(&mut self, view: NodeId, rect: Rect) {
        let record = self.0.entry(view).or_default();
        record.committed = Some(rect);
        record.target = None;
    }

    pub fn committed(&self, view: &NodeId) -> Option<Rect> { self.get(view)?.committed }
}
