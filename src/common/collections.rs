//! Hash containers used across the crate.
//!
//! Node ids are small integer keys, so the Fx hasher is used in place of
//! SipHash everywhere.

pub use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;
