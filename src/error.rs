//! Crate-level error type
//!
//! Module-specific errors (`SparsityError`, `QuantError`) convert into this
//! type via `From`, so pipeline code can use the crate `Result` alias and `?`
//! across module boundaries.

use crate::quant::QuantError;
use crate::sparsity::SparsityError;
use thiserror::Error;

/// Errors produced by podar operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sparsity(#[from] SparsityError),

    #[error(transparent)]
    Quant(#[from] QuantError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tensor format error: {0}")]
    TensorFormat(String),

    #[error("Workflow error: {0}")]
    Workflow(String),
}

/// Result type for crate-wide operations
pub type Result<T> = std::result::Result<T, Error>;
