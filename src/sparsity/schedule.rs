//! Sparsity level schedules
//!
//! A scheduler owns a step counter and maps it to a scale factor in `[0, 1]`
//! that multiplies every group's configured sparsity level:
//! - `LinearRamp`: linear interpolation between a start and end step
//! - `CubicRamp`: cubic schedule (Zhu & Gupta, 2017) for smoother transitions
//! - `LambdaScale`: arbitrary step-to-scale closure
//!
//! # Toyota Way: Kaizen (Continuous Improvement)
//! Ramped schedules raise sparsity incrementally instead of all at once.
//!
//! # References
//! - Zhu, M., & Gupta, S. (2017). To prune, or not to prune: exploring the
//!   efficacy of pruning for model compression. arXiv:1710.01878.

use crate::sparsity::{MaskUpdate, Sparsifier, SparsityError};

/// Maps a step counter to a sparsity level scale.
///
/// Implementations keep their own step counter so several schedulers can
/// run side by side. `get_sl` reads the scale at the current step without
/// advancing; `step` advances by one.
pub trait SparsityScheduler {
    /// Scale factor in `[0, 1]` for the current step.
    fn get_sl(&self) -> f32;

    /// Advance the step counter by one.
    fn step(&mut self);

    /// Push the current scale into a sparsifier ahead of its next mask
    /// update.
    fn apply<U: MaskUpdate>(&self, sparsifier: &mut Sparsifier<U>)
    where
        Self: Sized,
    {
        sparsifier.set_scale(self.get_sl());
    }
}

fn ramp_progress(current: usize, start: usize, end: usize) -> f32 {
    if current < start {
        0.0
    } else if current >= end {
        1.0
    } else {
        (current - start) as f32 / (end - start) as f32
    }
}

/// Linear ramp from scale 0 at `start_step` to scale 1 at `end_step`.
///
/// # Example
///
/// ```
/// use podar::sparsity::{LinearRamp, SparsityScheduler};
///
/// let mut ramp = LinearRamp::new(0, 4);
/// assert_eq!(ramp.get_sl(), 0.0);
/// ramp.step();
/// ramp.step();
/// assert_eq!(ramp.get_sl(), 0.5);
/// ramp.step();
/// ramp.step();
/// assert_eq!(ramp.get_sl(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearRamp {
    start_step: usize,
    end_step: usize,
    current_step: usize,
}

impl LinearRamp {
    /// Create a ramp spanning `[start_step, end_step]`, positioned at step 0.
    pub fn new(start_step: usize, end_step: usize) -> Self {
        Self {
            start_step,
            end_step,
            current_step: 0,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Check the ramp window is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `SparsityError::InvalidSchedule` when `end_step` does not
    /// exceed `start_step`.
    pub fn validate(&self) -> Result<(), SparsityError> {
        if self.end_step <= self.start_step {
            return Err(SparsityError::InvalidSchedule(format!(
                "end_step ({}) must be greater than start_step ({})",
                self.end_step, self.start_step
            )));
        }
        Ok(())
    }
}

impl SparsityScheduler for LinearRamp {
    fn get_sl(&self) -> f32 {
        ramp_progress(self.current_step, self.start_step, self.end_step)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Cubic ramp (Zhu & Gupta, 2017): scale rises quickly at first and
/// flattens as it approaches 1.
///
/// Formula: `scale = 1 - (1 - t/T)^3` over the ramp window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubicRamp {
    start_step: usize,
    end_step: usize,
    current_step: usize,
}

impl CubicRamp {
    /// Create a ramp spanning `[start_step, end_step]`, positioned at step 0.
    pub fn new(start_step: usize, end_step: usize) -> Self {
        Self {
            start_step,
            end_step,
            current_step: 0,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Check the ramp window is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `SparsityError::InvalidSchedule` when `end_step` does not
    /// exceed `start_step`.
    pub fn validate(&self) -> Result<(), SparsityError> {
        if self.end_step <= self.start_step {
            return Err(SparsityError::InvalidSchedule(format!(
                "end_step ({}) must be greater than start_step ({})",
                self.end_step, self.start_step
            )));
        }
        Ok(())
    }
}

impl SparsityScheduler for CubicRamp {
    fn get_sl(&self) -> f32 {
        let t = ramp_progress(self.current_step, self.start_step, self.end_step);
        1.0 - (1.0 - t).powi(3)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Scheduler driven by a user-supplied closure from step to scale.
///
/// The closure's result is clamped into `[0, 1]`.
///
/// # Example
///
/// ```
/// use podar::sparsity::{LambdaScale, SparsityScheduler};
///
/// // Full level from step 10 onward, dense before
/// let mut warmup = LambdaScale::new(|step| if step < 10 { 0.0 } else { 1.0 });
/// assert_eq!(warmup.get_sl(), 0.0);
/// for _ in 0..10 {
///     warmup.step();
/// }
/// assert_eq!(warmup.get_sl(), 1.0);
/// ```
pub struct LambdaScale {
    scale_fn: Box<dyn Fn(usize) -> f32>,
    current_step: usize,
}

impl LambdaScale {
    pub fn new(scale_fn: impl Fn(usize) -> f32 + 'static) -> Self {
        Self {
            scale_fn: Box::new(scale_fn),
            current_step: 0,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }
}

impl std::fmt::Debug for LambdaScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaScale")
            .field("current_step", &self.current_step)
            .finish_non_exhaustive()
    }
}

impl SparsityScheduler for LambdaScale {
    fn get_sl(&self) -> f32 {
        (self.scale_fn)(self.current_step).clamp(0.0, 1.0)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

// =============================================================================
// Tests
// =============================================================================
