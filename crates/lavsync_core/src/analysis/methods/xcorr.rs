//! Cross-correlation of energy envelopes.
//!
//! The raw lag products come from one FFT correlation. When the reference
//! envelope has dynamics, each lag is scored with the Pearson coefficient of
//! the overlapping segments, which keeps partial overlaps from being favored
//! or penalized by level alone. A flat reference (a steady tone, a hum) has
//! no shape to correlate; it is scored against the global norms instead and
//! only trusted when the reference window starts or ends at its source edge,
//! where the surrounding silence is real.

use crate::analysis::correlation::{
    coefficient_of_variation, fft_cross_correlation, lag_range, overlap, pearson_from_sums,
    PrefixSums,
};
use crate::analysis::peak_fit::{find_peak, fit_peak};
use crate::analysis::types::FeatureBundle;
use crate::models::AlgorithmKind;

use super::{lag_to_offset, AbstainReason, AlgorithmResult, RunContext, SyncAlgorithm};

/// Envelope cross-correlation estimator.
#[derive(Debug, Clone)]
pub struct EnvelopeCorrelation {
    /// Scores below this abstain.
    min_peak: f64,
    /// Reference envelopes with a coefficient of variation below this are
    /// treated as flat.
    flat_threshold: f64,
    /// Confidence multiplier when parabolic refinement succeeds.
    refinement_bonus: f64,
}

impl EnvelopeCorrelation {
    pub fn new() -> Self {
        Self {
            min_peak: 0.5,
            flat_threshold: 0.05,
            refinement_bonus: 1.1,
        }
    }

    /// Score every searchable lag. Returns the lowest lag and the scores.
    fn score_lags(
        &self,
        e1: &[f64],
        e2: &[f64],
        raw: &[f64],
        flat: bool,
    ) -> Option<(isize, Vec<f64>)> {
        let n1 = e1.len();
        let n2 = e2.len();
        let (lo, hi) = lag_range(n1, n2, n1.min(n2) / 2)?;
        let center = n1 as isize - 1;

        let scores = if flat {
            let norm = (e1.iter().map(|v| v * v).sum::<f64>()
                * e2.iter().map(|v| v * v).sum::<f64>())
            .sqrt();
            if norm <= f64::EPSILON {
                return None;
            }
            (lo..=hi)
                .map(|lag| raw[(lag + center) as usize] / norm)
                .collect()
        } else {
            let p1 = PrefixSums::new(e1);
            let p2 = PrefixSums::new(e2);
            (lo..=hi)
                .map(|lag| {
                    let (k0, k1) = overlap(n1, n2, lag);
                    let j0 = (k0 as isize + lag) as usize;
                    let j1 = (k1 as isize + lag) as usize;
                    pearson_from_sums(
                        raw[(lag + center) as usize],
                        k1 - k0,
                        p1.range(k0, k1),
                        p2.range(j0, j1),
                    )
                })
                .collect()
        };

        Some((lo, scores))
    }
}

impl Default for EnvelopeCorrelation {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAlgorithm for EnvelopeCorrelation {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::CrossCorrelation
    }

    fn description(&self) -> &str {
        "Cross-correlation of RMS energy envelopes"
    }

    fn run(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
    ) -> AlgorithmResult {
        let kind = self.kind();
        let e1 = &reference.energy;
        let e2 = &other.energy;

        if e1.len() < 3 || e2.len() < 3 {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        if reference.is_silent() || other.is_silent() {
            return AlgorithmResult::abstain(kind, AbstainReason::Silent);
        }

        let flat = coefficient_of_variation(e1) < self.flat_threshold;
        if flat && !reference.touches_source_boundary() {
            tracing::debug!("Flat reference envelope away from source edges");
            return AlgorithmResult::abstain(kind, AbstainReason::FlatReference);
        }

        if ctx.checkpoint.check().is_err() {
            return AlgorithmResult::abstain(kind, AbstainReason::Interrupted);
        }
        let raw = fft_cross_correlation(ctx.fft, e1, e2, ctx.quality.fft_padding());
        if ctx.checkpoint.check().is_err() {
            return AlgorithmResult::abstain(kind, AbstainReason::Interrupted);
        }

        let Some((lo, scores)) = self.score_lags(e1, e2, &raw, flat) else {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        };

        let last = scores.len() - 1;
        let Some(peak) = find_peak(&scores, 0, last) else {
            return AlgorithmResult::abstain(kind, AbstainReason::WeakPeak);
        };
        if peak == 0 || peak == last {
            return AlgorithmResult::abstain(kind, AbstainReason::PeakOnBoundary);
        }

        let value = scores[peak];
        if value < self.min_peak {
            return AlgorithmResult::abstain(kind, AbstainReason::WeakPeak);
        }

        let mut lag = (lo + peak as isize) as f64;
        let mut confidence = value.clamp(0.0, 1.0);
        if let Some(fit) = fit_peak(&scores, peak) {
            lag += fit.delta;
            confidence = (confidence * self.refinement_bonus).min(1.0);
        }

        let offset = lag_to_offset(reference, other, lag);
        tracing::debug!(
            "xcorr: lag {:.2} frames, peak {:.3} ({} mode)",
            lag,
            value,
            if flat { "flat" } else { "pearson" }
        );

        AlgorithmResult::estimate(kind, offset, confidence)
    }
}
