//! Quantization error types

use thiserror::Error;

/// Errors from calibration and model conversion
#[derive(Debug, Error)]
pub enum QuantError {
    #[error("Layer '{0}' has no calibration data; run calibrate first")]
    NotCalibrated(String),

    #[error("No calibration batches provided")]
    NoCalibrationData,

    #[error("Observer momentum {0} must be between 0.0 and 1.0")]
    InvalidMomentum(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant_error_display() {
        let err = QuantError::NotCalibrated("seq.0".to_string());
        assert!(format!("{}", err).contains("seq.0"));
        assert!(format!("{}", err).contains("calibrate"));

        let err = QuantError::NoCalibrationData;
        assert!(format!("{}", err).contains("batches"));

        let err = QuantError::InvalidMomentum(1.5);
        assert!(format!("{}", err).contains("1.5"));
    }
}
