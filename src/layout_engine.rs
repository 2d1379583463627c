mod arrange;
pub mod engine;
mod floating;
pub(crate) mod graph;
mod resize;

pub use arrange::{Placement, constrain_floating, distribute};
pub use engine::{Arrangement, LayoutCommand, LayoutEngine};
pub use floating::FLOATING_MOVE_STEP;
pub use graph::{Direction, LayoutKind, Orientation};
pub use resize::ResizeOutcome;
