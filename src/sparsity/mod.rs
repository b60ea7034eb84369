//! Mask-based sparsity machinery
//!
//! Layers are sparsified in three phases rather than by editing weights in
//! place:
//!
//! - **Prepare**: every configured layer gets an all-ones mask, so forward
//!   passes are unchanged
//! - **Step**: a mask policy recomputes each mask from the current weights
//!   at the scheduled sparsity level
//! - **Squash**: masks are multiplied into the weights and removed, leaving
//!   plain tensors with literal zeros
//!
//! The policy is pluggable through [`MaskUpdate`]; [`WeightNorm`] ranks
//! whole blocks by mean norm and [`Magnitude`] ranks individual weights.
//! [`SparsityScheduler`] implementations ramp the level over steps.
//!
//! # Example
//!
//! ```
//! use ndarray::{Array1, Array2};
//! use podar::nn::{Linear, Sequential};
//! use podar::sparsity::{SparsityConfig, WeightNormSparsifier};
//!
//! let weight = Array2::from_shape_fn((16, 16), |(r, c)| (r * 16 + c + 1) as f32);
//! let mut model = Sequential::new()
//!     .with_linear("fc", Linear::new(weight, Array1::zeros(16)));
//!
//! let mut sparsifier = WeightNormSparsifier::with_defaults();
//! sparsifier.prepare(&mut model)?;
//! sparsifier.step(&mut model)?;
//! sparsifier.squash_masks(&mut model)?;
//!
//! let report = model.sparsity_report();
//! assert!((report.overall - 0.5).abs() < 1e-6);
//! # Ok::<(), podar::sparsity::SparsityError>(())
//! ```
//!
//! # References
//!
//! - Zhu, M., & Gupta, S. (2017). To prune, or not to prune. arXiv:1710.01878.

mod config;
mod error;
mod magnitude;
mod mask;
mod schedule;
mod sparsifier;
mod weight_norm;

pub use config::{GroupSettings, SparsityConfig, SparsityGroup};
pub use error::SparsityError;
pub use magnitude::Magnitude;
pub use mask::SparsityMask;
pub use schedule::{CubicRamp, LambdaScale, LinearRamp, SparsityScheduler};
pub use sparsifier::{
    GroupState, MagnitudeSparsifier, MaskUpdate, Sparsifier, WeightNormSparsifier,
};
pub use weight_norm::{Norm, WeightNorm};
