//! Onset pattern matching.
//!
//! Candidate offsets come from pairing each of the first few reference onsets
//! with every onset of the other bundle. A candidate scores one point for
//! each reference onset that lands within tolerance of some onset on the
//! other side; the winner is refined to the mean matched displacement.

use crate::analysis::types::FeatureBundle;
use crate::models::AlgorithmKind;

use super::{lag_to_offset, AbstainReason, AlgorithmResult, RunContext, SyncAlgorithm};

/// Onset-matching estimator.
#[derive(Debug, Clone)]
pub struct OnsetAlignment {
    /// Minimum onsets required on each side.
    min_onsets: usize,
    /// Reference onsets used as anchors.
    anchors: usize,
    /// Match tolerance, in seconds (1000 samples at 44.1 kHz).
    tolerance_seconds: f64,
    /// Share of reference onsets a candidate must explain.
    min_match_ratio: f64,
    /// Onset count at which confidence saturates.
    saturation: f64,
}

/// Best candidate found by the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    matches: usize,
    /// Mean matched displacement, in frames.
    lag: f64,
}

impl OnsetAlignment {
    pub fn new() -> Self {
        Self {
            min_onsets: 3,
            anchors: 5,
            tolerance_seconds: 1000.0 / 44100.0,
            min_match_ratio: 0.5,
            saturation: 10.0,
        }
    }

    /// Count reference onsets matched under displacement `delta` frames and
    /// sum the matched displacements.
    fn score(&self, o1: &[usize], o2: &[usize], delta: isize, tolerance: f64) -> (usize, f64) {
        let mut matches = 0;
        let mut displacement = 0.0;
        for &onset in o1 {
            let target = onset as isize + delta;
            if let Some(found) = nearest(o2, target) {
                let diff = found as isize - onset as isize;
                if ((diff - delta) as f64).abs() <= tolerance {
                    matches += 1;
                    displacement += diff as f64;
                }
            }
        }
        (matches, displacement)
    }

    fn best_candidate(&self, o1: &[usize], o2: &[usize], tolerance: f64) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for &anchor in o1.iter().take(self.anchors) {
            for &target in o2 {
                let delta = target as isize - anchor as isize;
                let (matches, displacement) = self.score(o1, o2, delta, tolerance);
                if matches == 0 {
                    continue;
                }
                // First candidate wins ties
                if best.map_or(true, |b| matches > b.matches) {
                    best = Some(Candidate {
                        matches,
                        lag: displacement / matches as f64,
                    });
                }
            }
        }
        best
    }
}

impl Default for OnsetAlignment {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAlgorithm for OnsetAlignment {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Onset
    }

    fn description(&self) -> &str {
        "Onset pattern matching"
    }

    fn run(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
    ) -> AlgorithmResult {
        let kind = self.kind();
        let o1 = &reference.onsets;
        let o2 = &other.onsets;

        if o1.len() < self.min_onsets || o2.len() < self.min_onsets {
            return AlgorithmResult::abstain(kind, AbstainReason::TooFewOnsets);
        }
        let hop = reference.hop_seconds();
        if hop <= 0.0 {
            return AlgorithmResult::abstain(kind, AbstainReason::EmptyFeatures);
        }
        if ctx.checkpoint.check().is_err() {
            return AlgorithmResult::abstain(kind, AbstainReason::Interrupted);
        }

        let tolerance = self.tolerance_seconds / hop;
        let Some(best) = self.best_candidate(o1, o2, tolerance) else {
            return AlgorithmResult::abstain(kind, AbstainReason::PoorOnsetMatch);
        };

        let required = (self.min_match_ratio * o1.len() as f64).max(self.min_onsets as f64);
        if (best.matches as f64) < required {
            tracing::debug!(
                "onset: best candidate matched {}/{} onsets",
                best.matches,
                o1.len()
            );
            return AlgorithmResult::abstain(kind, AbstainReason::PoorOnsetMatch);
        }

        let confidence = (o1.len().min(o2.len()) as f64 / self.saturation).min(1.0);
        tracing::debug!(
            "onset: lag {:.2} frames, {}/{} matched",
            best.lag,
            best.matches,
            o1.len()
        );

        AlgorithmResult::estimate(kind, lag_to_offset(reference, other, best.lag), confidence)
    }
}

/// Onset in sorted `onsets` closest to `target`; the earlier one on ties.
fn nearest(onsets: &[usize], target: isize) -> Option<usize> {
    if onsets.is_empty() {
        return None;
    }
    if target < 0 {
        return onsets.first().copied();
    }
    let t = target as usize;
    let idx = onsets.partition_point(|&o| o < t);
    let after = onsets.get(idx).copied();
    let before = idx.checked_sub(1).map(|i| onsets[i]);
    match (before, after) {
        (Some(b), Some(a)) => Some(if t - b <= a - t { b } else { a }),
        (Some(b), None) => Some(b),
        (None, a) => a,
    }
}
