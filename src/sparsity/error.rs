//! Sparsity error types

use thiserror::Error;

/// Errors from sparsity configuration and the mask engine
#[derive(Debug, Error)]
pub enum SparsityError {
    #[error("Unknown layer in sparsity config: {0}")]
    UnknownLayer(String),

    #[error("Duplicate override for layer: {0}")]
    DuplicateOverride(String),

    #[error("Sparsity level {0} must be between 0.0 and 1.0")]
    LevelOutOfRange(f32),

    #[error("Block shape ({0}, {1}) must have non-zero dimensions")]
    EmptyBlock(usize, usize),

    #[error("zeros_per_block ({zeros}) exceeds block capacity ({capacity})")]
    ZerosExceedBlock { zeros: usize, capacity: usize },

    #[error("Sparsifier is not prepared; call prepare() first")]
    NotPrepared,

    #[error("Sparsifier is already prepared; squash masks before preparing again")]
    AlreadyPrepared,

    #[error("Mask shape ({0}, {1}) does not match weight shape ({2}, {3})")]
    ShapeMismatch(usize, usize, usize, usize),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}
