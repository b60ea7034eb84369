//! Range observers for calibration
//!
//! An observer accumulates the value range of tensors fed through it and
//! turns the range into quantization parameters. Min-max tracks the exact
//! extremes; moving average smooths them over batches so outliers in a
//! single batch matter less.

use crate::quant::QuantParams;

/// Range tracking method.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ObserverMethod {
    /// Running min/max over everything observed.
    #[default]
    MinMax,
    /// Exponential moving average of per-batch min/max.
    MovingAverage {
        /// Weight of the newest batch, in `[0, 1]`.
        momentum: f32,
    },
}

/// Accumulates value ranges and produces [`QuantParams`].
#[derive(Debug, Clone)]
pub struct Observer {
    method: ObserverMethod,
    symmetric: bool,
    running_min: Option<f32>,
    running_max: Option<f32>,
    num_batches: usize,
}

impl Observer {
    /// Min-max observer.
    pub fn min_max(symmetric: bool) -> Self {
        Self {
            method: ObserverMethod::MinMax,
            symmetric,
            running_min: None,
            running_max: None,
            num_batches: 0,
        }
    }

    /// Moving-average observer with the given momentum.
    pub fn moving_average(symmetric: bool, momentum: f32) -> Self {
        Self {
            method: ObserverMethod::MovingAverage { momentum },
            symmetric,
            running_min: None,
            running_max: None,
            num_batches: 0,
        }
    }

    /// Fold one batch of values into the running range. Empty batches are
    /// ignored.
    pub fn observe(&mut self, data: &[f32]) {
        if data.is_empty() {
            return;
        }

        let batch_min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let batch_max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        match self.method {
            ObserverMethod::MinMax => {
                self.running_min = Some(self.running_min.map_or(batch_min, |m| m.min(batch_min)));
                self.running_max = Some(self.running_max.map_or(batch_max, |m| m.max(batch_max)));
            }
            ObserverMethod::MovingAverage { momentum } => {
                self.running_min = Some(
                    self.running_min
                        .map_or(batch_min, |m| m * (1.0 - momentum) + batch_min * momentum),
                );
                self.running_max = Some(
                    self.running_max
                        .map_or(batch_max, |m| m * (1.0 - momentum) + batch_max * momentum),
                );
            }
        }

        self.num_batches += 1;
    }

    /// Quantization parameters for the observed range.
    ///
    /// Before any data is observed the range collapses to `[0, 0]` and the
    /// scale falls back to its floor.
    pub fn compute(&self) -> QuantParams {
        let min = self.running_min.unwrap_or(0.0);
        let max = self.running_max.unwrap_or(0.0);
        if self.symmetric {
            QuantParams::symmetric(min.abs().max(max.abs()))
        } else {
            QuantParams::affine(min, max)
        }
    }

    pub fn method(&self) -> ObserverMethod {
        self.method
    }

    pub fn has_data(&self) -> bool {
        self.num_batches > 0
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn range(&self) -> Option<(f32, f32)> {
        match (self.running_min, self.running_max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.running_min = None;
        self.running_max = None;
        self.num_batches = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_min_max_tracks_extremes() {
        let mut obs = Observer::min_max(false);
        obs.observe(&[1.0, 2.0, 3.0]);
        obs.observe(&[-5.0, 0.5]);
        assert_eq!(obs.range(), Some((-5.0, 3.0)));
        assert_eq!(obs.num_batches(), 2);
    }

    #[test]
    fn test_empty_batch_is_ignored() {
        let mut obs = Observer::min_max(false);
        obs.observe(&[]);
        assert!(!obs.has_data());
        assert!(obs.range().is_none());
    }

    #[test]
    fn test_moving_average_smooths_range() {
        let mut obs = Observer::moving_average(false, 0.5);
        obs.observe(&[0.0, 10.0]);
        // Second batch pulls the max halfway toward 20
        obs.observe(&[0.0, 20.0]);
        let (_, max) = obs.range().unwrap();
        assert_abs_diff_eq!(max, 15.0, epsilon = 1e-6);
    }

    #[test]
    fn test_moving_average_first_batch_initializes() {
        let mut obs = Observer::moving_average(false, 0.1);
        obs.observe(&[-2.0, 4.0]);
        assert_eq!(obs.range(), Some((-2.0, 4.0)));
    }

    #[test]
    fn test_symmetric_compute_uses_max_abs() {
        let mut obs = Observer::min_max(true);
        obs.observe(&[-4.0, 2.0]);
        let params = obs.compute();
        assert_eq!(params.zero_point, 0);
        assert_abs_diff_eq!(params.scale, 4.0 / 127.0, epsilon = 1e-9);
    }

    #[test]
    fn test_asymmetric_compute_covers_range() {
        let mut obs = Observer::min_max(false);
        obs.observe(&[-1.0, 3.0]);
        let params = obs.compute();
        assert_eq!(params.quantize(-1.0), 0);
        assert_eq!(params.quantize(3.0), 255);
    }

    #[test]
    fn test_compute_without_data_falls_back() {
        let obs = Observer::min_max(true);
        let params = obs.compute();
        assert!(params.scale > 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut obs = Observer::min_max(false);
        obs.observe(&[1.0]);
        obs.reset();
        assert!(!obs.has_data());
        assert!(obs.range().is_none());
    }
}
