//! Shared FFT plan cache.
//!
//! Plans are immutable once built and safe to share across threads. The lock
//! is held only while the planner looks up or builds a plan, never while a
//! transform runs.

use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::{Fft, FftPlanner};

/// Thread-safe wrapper around a `rustfft` planner.
pub struct FftCache {
    planner: Mutex<FftPlanner<f64>>,
}

impl FftCache {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Forward transform plan for `len` points.
    pub fn forward(&self, len: usize) -> Arc<dyn Fft<f64>> {
        self.planner.lock().plan_fft_forward(len)
    }

    /// Inverse (unnormalized) transform plan for `len` points.
    pub fn inverse(&self, len: usize) -> Arc<dyn Fft<f64>> {
        self.planner.lock().plan_fft_inverse(len)
    }
}

impl Default for FftCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FftCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftCache").finish_non_exhaustive()
    }
}
