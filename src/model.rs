pub mod error;
pub mod focus;
pub mod node;
pub mod snapshot;
pub mod store;
pub mod tree;
pub mod tx_store;

pub use error::TreeError;
pub use focus::{Activation, SeatId};
pub use node::{ContainerRole, Layout, NodeKind, Rank, SurfaceId};
pub use store::{Graph, NodeStore};
pub use tree::NodeId;
