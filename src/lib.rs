//! Podar: block sparsity and post-training quantization for small models
//!
//! This crate prunes the weights of feed-forward models with mask
//! parametrizations and then shrinks the surviving weights to 8-bit
//! integers. It implements:
//!
//! - **Sparsity Configuration**: a defaults group plus per-layer overrides
//! - **Mask Parametrization**: prepare, step, and squash phases over
//!   linear layers
//! - **Mask Policies**: block weight-norm and global magnitude ranking
//! - **Schedulers**: linear and cubic ramps plus arbitrary step functions
//! - **Quantization**: observer-calibrated int8 conversion with a block
//!   shape to kernel mapping
//! - **Workflows**: a YAML-driven pipeline producing safetensors artifacts
//!
//! # Example
//!
//! ```
//! use podar::nn::{Linear, Sequential};
//! use podar::sparsity::WeightNormSparsifier;
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let mut model = Sequential::new().with_linear("fc", Linear::init(16, 16, &mut rng));
//!
//! let mut sparsifier = WeightNormSparsifier::with_defaults();
//! sparsifier.prepare(&mut model)?;
//! sparsifier.step(&mut model)?;
//! sparsifier.squash_masks(&mut model)?;
//!
//! assert!((model.sparsity_report().overall - 0.5).abs() < 1e-6);
//! # Ok::<(), podar::Error>(())
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod nn;
pub mod quant;
pub mod sparsity;
pub mod workflow;

pub use error::{Error, Result};
