//! Core of a tiling window manager: the node tree, the layout engine that
//! arranges it, per-seat focus, and the transactions that apply new geometry
//! to every window of an output at once.

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;
pub mod sys;
