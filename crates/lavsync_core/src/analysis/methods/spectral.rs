//! Correlation of spectral-centroid sequences.
//!
//! Scores each lag with the Pearson coefficient of the overlapping centroid
//! segments and keeps the best integer lag.

use crate::analysis::correlation::{
    coefficient_of_variation, lag_range, overlap, pearson_from_sums, PrefixSums,
};
use crate::analysis::peak_fit::find_peak;
use crate::analysis::types::FeatureBundle;
use crate::models::AlgorithmKind;

use super::{lag_to_offset, AbstainReason, AlgorithmResult, RunContext, SyncAlgorithm};

/// Lags scored between checkpoint polls.
const LAGS_PER_CHECK: usize = 1024;

/// Spectral-centroid estimator.
#[derive(Debug, Clone)]
pub struct SpectralCorrelation {
    min_peak: f64,
    /// Reference sequences with a coefficient of variation below this carry
    /// no alignable shape.
    flat_threshold: f64,
}

impl SpectralCorrelation {
    pub fn new() -> Self {
        Self {
            min_peak: 0.5,
            flat_threshold: 0.02,
        }
    }
}

impl Default for SpectralCorrelation {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAlgorithm for SpectralCorrelation {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Spectral
    }

    fn description(&self) -> &str {
        "Correlation of spectral-centroid sequences"
    }

    fn run(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
    ) -> AlgorithmResult {
        let kind = self.kind();
        let c1 = &reference.spectral_centroid;
        let c2 = &other.spectral_centroid;

        if c1.len() < 2 || c2.len() < 2 {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        if reference.is_silent() || other.is_silent() {
            return AlgorithmResult::abstain(kind, AbstainReason::Silent);
        }
        if coefficient_of_variation(c1) < self.flat_threshold {
            return AlgorithmResult::abstain(kind, AbstainReason::FlatReference);
        }

        let (n1, n2) = (c1.len(), c2.len());
        let Some((lo, hi)) = lag_range(n1, n2, n1.min(n2) / 2) else {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        };

        let p1 = PrefixSums::new(c1);
        let p2 = PrefixSums::new(c2);
        let mut scores = Vec::with_capacity((hi - lo + 1) as usize);
        for (n, lag) in (lo..=hi).enumerate() {
            if n % LAGS_PER_CHECK == 0 && ctx.checkpoint.check().is_err() {
                return AlgorithmResult::abstain(kind, AbstainReason::Interrupted);
            }
            let (k0, k1) = overlap(n1, n2, lag);
            let j0 = (k0 as isize + lag) as usize;
            let j1 = (k1 as isize + lag) as usize;
            let cross: f64 = c1[k0..k1]
                .iter()
                .zip(&c2[j0..j1])
                .map(|(a, b)| a * b)
                .sum();
            scores.push(pearson_from_sums(cross, k1 - k0, p1.range(k0, k1), p2.range(j0, j1)));
        }

        let Some(peak) = find_peak(&scores, 0, scores.len() - 1) else {
            return AlgorithmResult::abstain(kind, AbstainReason::WeakPeak);
        };
        let value = scores[peak];
        if value < self.min_peak {
            return AlgorithmResult::abstain(kind, AbstainReason::WeakPeak);
        }

        let lag = lo + peak as isize;
        tracing::debug!("spectral: lag {} frames, correlation {:.3}", lag, value);

        AlgorithmResult::estimate(
            kind,
            lag_to_offset(reference, other, lag as f64),
            value.clamp(0.0, 1.0),
        )
    }
}
