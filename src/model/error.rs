use thiserror::Error;

use super::node::Rank;
use super::tree::NodeId;
use crate::layout_engine::LayoutKind;

/// Structural failures. A mutation that returns one of these has not touched
/// the tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("invalid hierarchy: cannot place {child:?} ({child_rank}) under {parent:?} ({parent_rank}): {reason}")]
    InvalidHierarchy {
        parent: NodeId,
        parent_rank: Rank,
        child: NodeId,
        child_rank: Rank,
        reason: &'static str,
    },
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("workspace {0:?} is not empty")]
    WorkspaceNotEmpty(NodeId),
    #[error("node {0:?} is not a container")]
    NotAContainer(NodeId),
    #[error("cannot swap {a:?} with its ancestor or descendant {b:?}")]
    AncestorSwap { a: NodeId, b: NodeId },
    #[error("a workspace named `{0}` already exists")]
    DuplicateWorkspace(String),
    #[error("node {0:?} is not attached to the tree")]
    Detached(NodeId),
    #[error("containers cannot switch to the {0} layout")]
    UnsupportedLayout(LayoutKind),
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
