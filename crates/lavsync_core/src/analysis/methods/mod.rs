//! Offset estimators.
//!
//! Every estimator implements [`SyncAlgorithm`] and reports an
//! [`AlgorithmResult`] in source time: an event at `t` in the reference
//! appears at `t + offset` in the other source. Estimators never fail; when
//! they have nothing to say they abstain with confidence 0 and a reason.

mod dtw;
mod onset;
mod spectral;
mod xcorr;

pub use dtw::DtwAlignment;
pub use onset::OnsetAlignment;
pub use spectral::SpectralCorrelation;
pub use xcorr::EnvelopeCorrelation;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::fft::FftCache;
use crate::analysis::types::FeatureBundle;
use crate::models::{AlgorithmKind, SyncQuality};
use crate::sync::Checkpoint;

/// Why an estimator declined to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
    /// A feature array the estimator needs is empty or too short.
    EmptyFeatures,
    /// One side never rises above the silence floor.
    Silent,
    /// The reference sequence has no variation to align.
    FlatReference,
    /// The best lag sits on the edge of the searched range.
    PeakOnBoundary,
    /// The best score is below the acceptance floor.
    WeakPeak,
    /// Fewer onsets than the matcher needs.
    TooFewOnsets,
    /// No candidate offset explains enough of the reference onsets.
    PoorOnsetMatch,
    /// The warping path cannot reach the end cell.
    Unreachable,
    /// Accumulated alignment cost leaves no confidence.
    CostTooHigh,
    /// Applying the offset would move the reference outside the other source.
    OutsideSource,
    /// The offset exceeds the configured maximum.
    OutsideSearchRange,
    /// Cancelled or out of time before finishing.
    Interrupted,
}

impl std::fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AbstainReason::EmptyFeatures => "empty features",
            AbstainReason::Silent => "silent input",
            AbstainReason::FlatReference => "flat reference",
            AbstainReason::PeakOnBoundary => "peak on search boundary",
            AbstainReason::WeakPeak => "weak peak",
            AbstainReason::TooFewOnsets => "too few onsets",
            AbstainReason::PoorOnsetMatch => "poor onset match",
            AbstainReason::Unreachable => "alignment unreachable",
            AbstainReason::CostTooHigh => "alignment cost too high",
            AbstainReason::OutsideSource => "offset leaves source",
            AbstainReason::OutsideSearchRange => "offset beyond maximum",
            AbstainReason::Interrupted => "interrupted",
        };
        write!(f, "{}", text)
    }
}

/// One estimator's opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub algorithm: AlgorithmKind,
    /// Offset in seconds; 0 when abstaining.
    pub offset_seconds: f64,
    /// Confidence in [0, 1]; 0 means abstain.
    pub confidence: f64,
    /// Wall time spent in the estimator.
    pub elapsed: Duration,
    /// Set when confidence is 0.
    pub abstain_reason: Option<AbstainReason>,
}

impl AlgorithmResult {
    /// An answer. Non-finite offsets and zero confidence become abstentions.
    pub fn estimate(algorithm: AlgorithmKind, offset_seconds: f64, confidence: f64) -> Self {
        if !offset_seconds.is_finite() || !confidence.is_finite() || confidence <= 0.0 {
            return Self::abstain(algorithm, AbstainReason::WeakPeak);
        }
        Self {
            algorithm,
            offset_seconds,
            confidence: confidence.min(1.0),
            elapsed: Duration::ZERO,
            abstain_reason: None,
        }
    }

    pub fn abstain(algorithm: AlgorithmKind, reason: AbstainReason) -> Self {
        Self {
            algorithm,
            offset_seconds: 0.0,
            confidence: 0.0,
            elapsed: Duration::ZERO,
            abstain_reason: Some(reason),
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_abstain(&self) -> bool {
        self.confidence <= 0.0
    }
}

/// Per-call inputs shared by all estimators.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub quality: SyncQuality,
    pub fft: &'a FftCache,
    pub checkpoint: &'a Checkpoint,
}

/// Common contract for offset estimators.
pub trait SyncAlgorithm: Send + Sync {
    fn kind(&self) -> AlgorithmKind;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Estimate the offset of `other` relative to `reference`.
    fn run(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
    ) -> AlgorithmResult;
}

/// The standard estimator set, in execution order.
pub fn default_algorithms() -> Vec<Box<dyn SyncAlgorithm>> {
    vec![
        Box::new(EnvelopeCorrelation::default()),
        Box::new(DtwAlignment::default()),
        Box::new(OnsetAlignment::default()),
        Box::new(SpectralCorrelation::default()),
    ]
}

/// Look up an estimator by its short tag.
pub fn create_algorithm(tag: &str) -> Option<Box<dyn SyncAlgorithm>> {
    match tag.to_lowercase().as_str() {
        "xcorr" | "cross_correlation" => Some(Box::new(EnvelopeCorrelation::default())),
        "dtw" => Some(Box::new(DtwAlignment::default())),
        "onset" => Some(Box::new(OnsetAlignment::default())),
        "spectral" => Some(Box::new(SpectralCorrelation::default())),
        _ => None,
    }
}

/// Offset in seconds for a frame lag between two bundles, accounting for
/// where each bundle starts in its source.
pub(crate) fn lag_to_offset(
    reference: &FeatureBundle,
    other: &FeatureBundle,
    lag_frames: f64,
) -> f64 {
    (other.start_seconds - reference.start_seconds) + lag_frames * reference.hop_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_covers_every_kind_in_order() {
        let kinds: Vec<_> = default_algorithms().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, AlgorithmKind::ALL.to_vec());
    }

    #[test]
    fn create_algorithm_by_tag() {
        for kind in AlgorithmKind::ALL {
            let algo = create_algorithm(kind.label()).unwrap();
            assert_eq!(algo.kind(), kind);
            assert!(!algo.description().is_empty());
        }
        assert!(create_algorithm("XCORR").is_some());
        assert!(create_algorithm("unknown").is_none());
    }

    #[test]
    fn estimate_guards_invalid_values() {
        let r = AlgorithmResult::estimate(AlgorithmKind::Onset, f64::NAN, 0.9);
        assert!(r.is_abstain());
        let r = AlgorithmResult::estimate(AlgorithmKind::Onset, 1.0, 0.0);
        assert!(r.is_abstain());
        let r = AlgorithmResult::estimate(AlgorithmKind::Onset, 1.0, 1.5);
        assert_eq!(r.confidence, 1.0);
        assert!(r.abstain_reason.is_none());
    }

    #[test]
    fn lag_accounts_for_bundle_starts() {
        let a = FeatureBundle::empty(2048, 512, 44100, 10.0);
        let b = FeatureBundle::empty(2048, 512, 44100, 0.0);
        let offset = lag_to_offset(&a, &b, 861.328125);
        assert!((offset - 0.0).abs() < 1e-9, "offset {offset}");
    }
}
