use serde::{Deserialize, Serialize};

use super::tree::NodeId;
use crate::common::config::BorderStyle;
use crate::layout_engine::{LayoutKind, Orientation};
use crate::sys::geometry::{Rect, Size};

/// Position of a variant in the hierarchy. A child always ranks strictly
/// higher than its parent.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rank {
    Root,
    Output,
    Workspace,
    Container,
    View,
}

/// Opaque handle the backend uses for a client surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Content area; excludes gaps, and for views also the border.
    pub geometry: Rect,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Output(OutputData),
    Workspace(WorkspaceData),
    Container(ContainerData),
    View(ViewData),
}

impl NodeKind {
    pub fn rank(&self) -> Rank {
        match self {
            NodeKind::Root => Rank::Root,
            NodeKind::Output(_) => Rank::Output,
            NodeKind::Workspace(_) => Rank::Workspace,
            NodeKind::Container(_) => Rank::Container,
            NodeKind::View(_) => Rank::View,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputData {
    pub name: String,
    /// Authoritative position in the global layout space.
    pub rect: Rect,
    pub active_workspace: Option<NodeId>,
    /// Floating containers shown on every workspace of this output.
    pub sticky: NodeId,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct WorkspaceData {
    pub name: String,
    pub tiling: NodeId,
    pub floating: NodeId,
    pub fullscreen: Option<NodeId>,
}

/// What a container is for. The role never changes after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerRole {
    /// Root of a workspace's tiling tree.
    Tiling,
    /// Pseudo-container holding floating children of a workspace or output.
    Floating,
    /// Internal split node.
    Split,
    /// Wrapper around exactly one view.
    Leaf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStyle {
    Tabbed,
    Stacked,
}

/// Per-child extents captured when a split container becomes tabbed or
/// stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSnapshot {
    pub orientation: Orientation,
    pub extents: Vec<(NodeId, Rect)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Split {
        orientation: Orientation,
    },
    Grouped {
        style: GroupStyle,
        restore: Option<SplitSnapshot>,
    },
    Floating,
}

impl Layout {
    pub fn from_kind(kind: LayoutKind) -> Layout {
        match kind {
            LayoutKind::Horizontal => Layout::Split { orientation: Orientation::Horizontal },
            LayoutKind::Vertical => Layout::Split { orientation: Orientation::Vertical },
            LayoutKind::Tabbed => Layout::Grouped {
                style: GroupStyle::Tabbed,
                restore: None,
            },
            LayoutKind::Stacked => Layout::Grouped {
                style: GroupStyle::Stacked,
                restore: None,
            },
            LayoutKind::Floating => Layout::Floating,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        match self {
            Layout::Split { orientation: Orientation::Horizontal } => LayoutKind::Horizontal,
            Layout::Split { orientation: Orientation::Vertical } => LayoutKind::Vertical,
            Layout::Grouped { style: GroupStyle::Tabbed, .. } => LayoutKind::Tabbed,
            Layout::Grouped { style: GroupStyle::Stacked, .. } => LayoutKind::Stacked,
            Layout::Floating => LayoutKind::Floating,
        }
    }

    pub fn split_orientation(&self) -> Option<Orientation> {
        match self {
            Layout::Split { orientation } => Some(*orientation),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool { matches!(self, Layout::Grouped { .. }) }
}

#[derive(Debug, Clone)]
pub struct ContainerData {
    pub role: ContainerRole,
    pub layout: Layout,
    /// Created implicitly (view wrapper, split, nesting) and reaped once empty.
    pub auto: bool,
    pub fullscreen: bool,
    /// Floating rectangle remembered while the container is tiled.
    pub saved_floating: Option<Rect>,
    /// Rectangle held before going fullscreen.
    pub saved_geometry: Option<Rect>,
    pub in_scratchpad: bool,
}

impl ContainerData {
    pub fn new(role: ContainerRole, layout: Layout) -> Self {
        ContainerData {
            role,
            layout,
            auto: matches!(role, ContainerRole::Split | ContainerRole::Leaf),
            fullscreen: false,
            saved_floating: None,
            saved_geometry: None,
            in_scratchpad: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewData {
    pub surface: SurfaceId,
    pub title: String,
    pub app_id: Option<String>,
    /// Size the client asked for when it mapped.
    pub natural: Size,
    pub border: BorderStyle,
    /// Logical OR over every seat focusing this view.
    pub activated: bool,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        NodeData {
            kind,
            geometry: Rect::ZERO,
            visible: false,
        }
    }

    pub fn rank(&self) -> Rank { self.kind.rank() }

    pub fn container(&self) -> Option<&ContainerData> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut ContainerData> {
        match &mut self.kind {
            NodeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn view(&self) -> Option<&ViewData> {
        match &self.kind {
            NodeKind::View(v) => Some(v),
            _ => None,
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut ViewData> {
        match &mut self.kind {
            NodeKind::View(v) => Some(v),
            _ => None,
        }
    }

    pub fn workspace(&self) -> Option<&WorkspaceData> {
        match &self.kind {
            NodeKind::Workspace(w) => Some(w),
            _ => None,
        }
    }

    pub fn workspace_mut(&mut self) -> Option<&mut WorkspaceData> {
        match &mut self.kind {
            NodeKind::Workspace(w) => Some(w),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&OutputData> {
        match &self.kind {
            NodeKind::Output(o) => Some(o),
            _ => None,
        }
    }

    pub fn output_mut(&mut self) -> Option<&mut OutputData> {
        match &mut self.kind {
            NodeKind::Output(o) => Some(o),
            _ => None,
        }
    }

    /// Human-readable label used by the tree dump and the query walk.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Output(o) => Some(&o.name),
            NodeKind::Workspace(w) => Some(&w.name),
            NodeKind::View(v) => Some(&v.title),
            NodeKind::Root | NodeKind::Container(_) => None,
        }
    }
}
