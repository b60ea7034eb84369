//! 8-bit quantization: PTQ and fake quantization
//!
//! Provides the quantization half of the compression pipeline:
//! - Range observers and PTQ calibration over representative inputs
//! - Conversion of linear layers to 8-bit integer weights
//! - Fake quantization for exercising models with quantization error
//! - Sparse kernel selection from pruning block shapes

mod convert;
mod error;
mod fake;
mod kernel;
mod observer;
mod params;
mod qlinear;

pub use convert::{calibrate, convert, Calibration};
pub use error::QuantError;
pub use fake::FakeQuantize;
pub use kernel::{KernelTable, SparseKernel};
pub use observer::{Observer, ObserverMethod};
pub use params::{QuantConfig, QuantParams, WeightScheme};
pub use qlinear::QuantLinear;
