//! Model serialization in SafeTensors format
//!
//! Dense models save their weights, biases, and attached masks as F32
//! tensors; converted models save 8-bit weights with their quantization
//! parameters. Sizes can be compared to measure what quantization saved.

mod load;
mod save;
mod size;

pub use load::load_model;
pub use save::{save_model, save_quantized, FORMAT_DENSE, FORMAT_INT8};
pub use size::{compare_sizes, file_size, SizeReport};
