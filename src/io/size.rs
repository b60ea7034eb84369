//! On-disk size comparison between dense and quantized models

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size of a file in bytes.
///
/// # Errors
///
/// Returns `Error::Io` when the file cannot be inspected.
pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    Ok(std::fs::metadata(path.as_ref())?.len())
}

/// Byte sizes of a dense checkpoint and its quantized counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReport {
    pub dense_bytes: u64,
    pub quantized_bytes: u64,
}

impl SizeReport {
    /// Compression ratio, dense over quantized. Zero when the quantized
    /// size is zero.
    pub fn ratio(&self) -> f32 {
        if self.quantized_bytes == 0 {
            return 0.0;
        }
        self.dense_bytes as f32 / self.quantized_bytes as f32
    }

    /// Fraction of bytes saved, as a percentage of the dense size.
    pub fn saving_percent(&self) -> f32 {
        if self.dense_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.quantized_bytes as f32 / self.dense_bytes as f32) * 100.0
    }
}

/// Measure both files and build a [`SizeReport`].
pub fn compare_sizes(
    dense_path: impl AsRef<Path>,
    quantized_path: impl AsRef<Path>,
) -> Result<SizeReport> {
    Ok(SizeReport {
        dense_bytes: file_size(dense_path)?,
        quantized_bytes: file_size(quantized_path)?,
    })
}
