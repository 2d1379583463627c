use serde::{Deserialize, Serialize};

use crate::sys::geometry::{Rect, Size};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Extent of `size` along this axis.
    pub fn extent(self, size: Size) -> f64 {
        match self {
            Orientation::Horizontal => size.width,
            Orientation::Vertical => size.height,
        }
    }

    /// Start coordinate of `rect` along this axis.
    pub fn start(self, rect: Rect) -> f64 {
        match self {
            Orientation::Horizontal => rect.origin.x,
            Orientation::Vertical => rect.origin.y,
        }
    }

    /// A copy of `rect` with its span along this axis replaced.
    pub fn with_span(self, rect: Rect, start: f64, extent: f64) -> Rect {
        let mut out = rect;
        match self {
            Orientation::Horizontal => {
                out.origin.x = start;
                out.size.width = extent;
            }
            Orientation::Vertical => {
                out.origin.y = start;
                out.size.height = extent;
            }
        }
        out
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// True for the directions that point towards later siblings.
    pub fn is_forward(self) -> bool { matches!(self, Direction::Right | Direction::Down) }
}

#[derive(
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Horizontal,
    Vertical,
    Tabbed,
    Stacked,
    Floating,
}

impl LayoutKind {
    pub fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => LayoutKind::Horizontal,
            Orientation::Vertical => LayoutKind::Vertical,
        }
    }

    pub fn orientation(self) -> Option<Orientation> {
        match self {
            LayoutKind::Horizontal => Some(Orientation::Horizontal),
            LayoutKind::Vertical => Some(Orientation::Vertical),
            _ => None,
        }
    }

    pub fn is_group(self) -> bool { matches!(self, LayoutKind::Tabbed | LayoutKind::Stacked) }
}
