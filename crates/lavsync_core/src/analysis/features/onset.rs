//! Onset detection on the energy envelope.
//!
//! An onset is a frame whose energy exceeds a running threshold, is a local
//! maximum against both neighbors, and lies at least `min_gap_frames` past
//! the previous onset. The threshold tracks the mean and spread of the
//! preceding half second of frames.

use std::collections::VecDeque;

/// Threshold multiplier on the running mean.
const MEAN_RATIO: f64 = 1.25;
/// Threshold multiplier on the running standard deviation.
const STD_FACTOR: f64 = 0.5;
/// Absolute threshold floor (about -46 dBFS RMS).
const ENERGY_FLOOR: f64 = 0.005;
/// Seconds of history feeding the running threshold.
const HISTORY_SECONDS: f64 = 0.5;
/// Frames of history required before detection starts.
const WARMUP_FRAMES: usize = 8;

/// Mean and variance over the last `capacity` values.
#[derive(Debug, Clone)]
pub struct RollingStatistics {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    sum_sq: f64,
}

impl RollingStatistics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f64
    }

    /// Population variance, clamped at zero against rounding drift.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Running-threshold peak picker over an energy envelope.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    min_gap_frames: usize,
    history_frames: usize,
}

impl OnsetDetector {
    /// Build a detector for envelopes sampled every `hop_size` samples.
    pub fn new(min_gap_seconds: f64, hop_size: usize, sample_rate: u32) -> Self {
        let frames_per_second = if hop_size == 0 {
            0.0
        } else {
            sample_rate as f64 / hop_size as f64
        };
        Self {
            min_gap_frames: (min_gap_seconds * frames_per_second).ceil().max(1.0) as usize,
            history_frames: (HISTORY_SECONDS * frames_per_second).round().max(1.0) as usize,
        }
    }

    pub fn min_gap_frames(&self) -> usize {
        self.min_gap_frames
    }

    /// Strictly increasing onset frame indices.
    pub fn detect(&self, energy: &[f64]) -> Vec<usize> {
        let mut onsets = Vec::new();
        if energy.len() < 3 {
            return onsets;
        }

        let mut history = RollingStatistics::new(self.history_frames);
        let mut last: Option<usize> = None;

        for k in 0..energy.len() {
            let e = energy[k];
            let interior = k > 0 && k + 1 < energy.len();

            if interior && history.len() >= WARMUP_FRAMES {
                let threshold =
                    MEAN_RATIO * history.mean() + STD_FACTOR * history.std_dev() + ENERGY_FLOOR;
                let is_peak = e > energy[k - 1] && e >= energy[k + 1];
                let spaced = last.map_or(true, |prev| k - prev >= self.min_gap_frames);

                if e > threshold && is_peak && spaced {
                    onsets.push(k);
                    last = Some(k);
                }
            }

            history.push(e);
        }

        onsets
    }
}
