//! Confidence-weighted fusion of estimator results.
//!
//! Each result's table weight (selected by content label) is scaled by its
//! own confidence. The fused offset and confidence are means under those
//! effective weights, followed by feature-agreement bonuses and a penalty for
//! large offsets. This is the only place disagreement becomes an abstain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::methods::AlgorithmResult;
use crate::analysis::types::FeatureBundle;
use crate::models::{AlgorithmKind, ContentLabel};

/// Both bundles carry cepstra.
const CEPSTRA_BONUS: f64 = 1.10;
/// Both bundles carry more than `ONSET_BONUS_MIN` onsets.
const ONSET_BONUS: f64 = 1.05;
const ONSET_BONUS_MIN: usize = 5;
/// Offsets beyond `LARGE_OFFSET_SECONDS` are less trustworthy.
const LARGE_OFFSET_PENALTY: f64 = 0.80;
const LARGE_OFFSET_SECONDS: f64 = 10.0;

/// Per-content estimator weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    rows: BTreeMap<ContentLabel, BTreeMap<AlgorithmKind, f64>>,
}

impl Default for WeightTable {
    fn default() -> Self {
        use AlgorithmKind::{CrossCorrelation as X, Dtw as D, Onset as O, Spectral as S};

        let table = [
            (ContentLabel::Speech, [0.40, 0.40, 0.10, 0.10]),
            (ContentLabel::Music, [0.20, 0.30, 0.30, 0.20]),
            (ContentLabel::Mixed, [0.30, 0.30, 0.20, 0.20]),
            (ContentLabel::Silence, [0.70, 0.20, 0.05, 0.05]),
            (ContentLabel::Noise, [0.50, 0.30, 0.10, 0.10]),
            (ContentLabel::Unknown, [0.35, 0.35, 0.15, 0.15]),
        ];

        let rows = table
            .into_iter()
            .map(|(label, w)| {
                let row: BTreeMap<AlgorithmKind, f64> = [X, D, O, S].into_iter().zip(w).collect();
                (label, row)
            })
            .collect();
        Self { rows }
    }
}

impl WeightTable {
    /// Weight of `kind` under `label`; 0 when not listed.
    pub fn weight(&self, label: ContentLabel, kind: AlgorithmKind) -> f64 {
        self.rows
            .get(&label)
            .and_then(|row| row.get(&kind))
            .copied()
            .unwrap_or(0.0)
    }

    /// Set one entry. Negative or non-finite weights are stored as 0.
    pub fn set(&mut self, label: ContentLabel, kind: AlgorithmKind, weight: f64) {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self.rows.entry(label).or_default().insert(kind, weight);
    }
}

/// Why fusion produced no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// No estimator carried weight.
    NoSupport,
    /// The fused offset exceeds the configured maximum.
    BeyondMaxOffset,
    /// The analysis window is shorter than the usable minimum.
    WindowTooShort,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoSupport => write!(f, "no estimator support"),
            Rejection::BeyondMaxOffset => write!(f, "offset beyond maximum"),
            Rejection::WindowTooShort => write!(f, "analysis window too short"),
        }
    }
}

/// Fused outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedEstimate {
    pub offset_seconds: f64,
    pub confidence: f64,
    /// Estimators that contributed a non-zero weight.
    pub contributors: usize,
    pub rejection: Option<Rejection>,
}

impl FusedEstimate {
    fn rejected(reason: Rejection) -> Self {
        Self {
            offset_seconds: 0.0,
            confidence: 0.0,
            contributors: 0,
            rejection: Some(reason),
        }
    }

    pub fn is_abstain(&self) -> bool {
        self.confidence <= 0.0
    }
}

/// Combines estimator results.
#[derive(Debug, Clone, Default)]
pub struct Fusion {
    weights: WeightTable,
}

impl Fusion {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Fuse `results` for a window classified as `content`.
    ///
    /// `window_usable` is false when the analysis window is too short to
    /// trust; the result is then forced to abstain.
    pub fn fuse(
        &self,
        results: &[AlgorithmResult],
        content: ContentLabel,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        max_offset_seconds: f64,
        window_usable: bool,
    ) -> FusedEstimate {
        if !window_usable {
            return FusedEstimate::rejected(Rejection::WindowTooShort);
        }

        let mut total_weight = 0.0;
        let mut weighted_offset = 0.0;
        let mut weighted_confidence = 0.0;
        let mut contributors = 0;

        for result in results.iter().filter(|r| !r.is_abstain()) {
            let effective = self.weights.weight(content, result.algorithm) * result.confidence;
            if effective <= 0.0 {
                continue;
            }
            total_weight += effective;
            weighted_offset += effective * result.offset_seconds;
            weighted_confidence += effective * result.confidence;
            contributors += 1;
        }

        if total_weight <= 0.0 {
            return FusedEstimate::rejected(Rejection::NoSupport);
        }

        let offset = weighted_offset / total_weight;
        let mut confidence = weighted_confidence / total_weight;

        if reference.has_cepstra() && other.has_cepstra() {
            confidence = (confidence * CEPSTRA_BONUS).min(1.0);
        }
        if reference.onsets.len() > ONSET_BONUS_MIN && other.onsets.len() > ONSET_BONUS_MIN {
            confidence *= ONSET_BONUS;
        }
        if offset.abs() > LARGE_OFFSET_SECONDS {
            confidence *= LARGE_OFFSET_PENALTY;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        if offset.abs() > max_offset_seconds {
            tracing::debug!(
                "Fused offset {:.3}s exceeds maximum {:.1}s",
                offset,
                max_offset_seconds
            );
            return FusedEstimate::rejected(Rejection::BeyondMaxOffset);
        }

        FusedEstimate {
            offset_seconds: offset,
            confidence,
            contributors,
            rejection: None,
        }
    }
}
