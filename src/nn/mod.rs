//! Model containers
//!
//! Small sequential models built from named linear and activation layers.
//! Layer names are the target references used by sparsity config groups.

mod activation;
mod linear;
mod sequential;

pub use activation::Activation;
pub use linear::Linear;
pub use sequential::{Layer, LayerSparsity, Sequential, SparsityReport};
