use thiserror::Error;

use crate::model::node::SurfaceId;
use crate::model::{SeatId, TreeError};

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("unknown surface: {0:?}")]
    UnknownSurface(SurfaceId),
    #[error("unknown output `{0}`")]
    UnknownOutput(String),
    #[error("unknown seat `{0}`")]
    UnknownSeat(String),
    #[error("seat {0:?} has nothing focused")]
    NoFocus(SeatId),
    #[error("backend channel closed")]
    BackendGone,
}

pub type Result<T, E = ReactorError> = std::result::Result<T, E>;
