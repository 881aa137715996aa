//! Core enums used throughout the crate.

use serde::{Deserialize, Serialize};

/// Dominant acoustic class of an analysis window.
///
/// Selects the fusion weight row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentLabel {
    Speech,
    Music,
    Mixed,
    Silence,
    Noise,
    /// Feature bundle was empty.
    #[default]
    Unknown,
}

impl ContentLabel {
    /// Every label, in weight-table order.
    pub const ALL: [ContentLabel; 6] = [
        ContentLabel::Speech,
        ContentLabel::Music,
        ContentLabel::Mixed,
        ContentLabel::Silence,
        ContentLabel::Noise,
        ContentLabel::Unknown,
    ];
}

impl std::fmt::Display for ContentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentLabel::Speech => write!(f, "speech"),
            ContentLabel::Music => write!(f, "music"),
            ContentLabel::Mixed => write!(f, "mixed"),
            ContentLabel::Silence => write!(f, "silence"),
            ContentLabel::Noise => write!(f, "noise"),
            ContentLabel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identifies one offset estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Cross-correlation of the energy envelopes.
    CrossCorrelation,
    /// Multi-scale dynamic time warping on cepstral features.
    Dtw,
    /// Onset pattern matching.
    Onset,
    /// Correlation of spectral-centroid sequences.
    Spectral,
}

impl AlgorithmKind {
    /// Every estimator, in execution order.
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::CrossCorrelation,
        AlgorithmKind::Dtw,
        AlgorithmKind::Onset,
        AlgorithmKind::Spectral,
    ];

    /// Short tag used in logs and traces.
    pub fn label(&self) -> &'static str {
        match self {
            AlgorithmKind::CrossCorrelation => "xcorr",
            AlgorithmKind::Dtw => "dtw",
            AlgorithmKind::Onset => "onset",
            AlgorithmKind::Spectral => "spectral",
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Speed/accuracy trade-off for a synchronization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncQuality {
    /// Two coarse DTW scales only.
    RealTime,
    /// Full DTW scale ladder.
    #[default]
    Standard,
    /// Full DTW scale ladder and doubled FFT length for correlation.
    HighQuality,
}

impl SyncQuality {
    /// DTW downsample factors, coarse to fine.
    pub fn dtw_scales(&self) -> &'static [usize] {
        match self {
            SyncQuality::RealTime => &[8, 4],
            SyncQuality::Standard | SyncQuality::HighQuality => &[8, 4, 2, 1],
        }
    }

    /// Multiplier applied to the power-of-two correlation FFT length.
    pub fn fft_padding(&self) -> usize {
        match self {
            SyncQuality::HighQuality => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for SyncQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncQuality::RealTime => write!(f, "real_time"),
            SyncQuality::Standard => write!(f, "standard"),
            SyncQuality::HighQuality => write!(f, "high_quality"),
        }
    }
}

/// How the spectral features are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralBackend {
    /// Windowed FFT per frame (centroid from the power spectrum, MFCC).
    #[default]
    Fft,
    /// Zero-crossing surrogate. Lower fidelity; no FFT is run.
    ZeroCrossing,
}

/// Caller-facing interpretation of a fused confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Below the usable threshold.
    Reject,
    /// Typically usable.
    Usable,
    /// Typically correct.
    High,
}

impl ConfidenceBand {
    /// Lowest confidence that is typically usable.
    pub const USABLE_THRESHOLD: f64 = 0.3;
    /// Lowest confidence that is typically correct.
    pub const HIGH_THRESHOLD: f64 = 0.8;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::HIGH_THRESHOLD {
            ConfidenceBand::High
        } else if confidence >= Self::USABLE_THRESHOLD {
            ConfidenceBand::Usable
        } else {
            ConfidenceBand::Reject
        }
    }
}
