//! Synchronization reports and errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{AlgorithmResult, AnalysisWindow, FusedEstimate, PcmError, Rejection};
use crate::decode::DecodeError;
use crate::models::{AlgorithmKind, ConfidenceBand, ContentLabel, MediaRef};

use super::control::Interrupt;

/// Tag reported for the fused estimate.
pub const FUSED_ALGORITHM: &str = "hybrid";

/// Outcome kind of a synchronization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// An offset with non-zero confidence.
    Ok,
    /// Analysis completed without a usable offset.
    Abstain,
    /// Invalid durations, options or samples.
    InputInvalid,
    /// The decoder failed.
    DecodeFailed,
    Cancelled,
    Timeout,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Ok => write!(f, "ok"),
            SyncStatus::Abstain => write!(f, "abstain"),
            SyncStatus::InputInvalid => write!(f, "input_invalid"),
            SyncStatus::DecodeFailed => write!(f, "decode_failed"),
            SyncStatus::Cancelled => write!(f, "cancelled"),
            SyncStatus::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<Interrupt> for SyncStatus {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => SyncStatus::Cancelled,
            Interrupt::TimedOut => SyncStatus::Timeout,
        }
    }
}

/// Errors returned instead of a report.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode {media}: {source}")]
    Decode {
        media: MediaRef,
        #[source]
        source: DecodeError,
    },

    #[error("Analysis {0}")]
    Interrupted(Interrupt),
}

impl SyncError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        SyncError::InvalidOptions(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        SyncError::InvalidInput(msg.into())
    }

    pub fn decode(media: &MediaRef, source: DecodeError) -> Self {
        SyncError::Decode {
            media: media.clone(),
            source,
        }
    }

    /// PCM that broke the decoder contract.
    pub fn invalid_pcm(media: &MediaRef, err: PcmError) -> Self {
        SyncError::InvalidInput(format!("{}: {}", media, err))
    }

    /// Status kind matching this error.
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncError::InvalidOptions(_) | SyncError::InvalidInput(_) => SyncStatus::InputInvalid,
            SyncError::Decode {
                source: DecodeError::Cancelled,
                ..
            } => SyncStatus::Cancelled,
            SyncError::Decode { .. } => SyncStatus::DecodeFailed,
            SyncError::Interrupted(interrupt) => (*interrupt).into(),
        }
    }
}

/// Final answer of a synchronization call.
///
/// Positive offsets mean source `b` starts after source `a`: an event at `t`
/// in `a` is heard at `t + offset_seconds` in `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// 0 unless `status` is `Ok`.
    pub offset_seconds: f64,
    /// In [0, 1]; 0 unless `status` is `Ok`.
    pub confidence: f64,
    /// Label of the reference window.
    pub content: ContentLabel,
    /// Reference window analyzed in source `a`.
    pub window: Option<AnalysisWindow>,
    /// Per-estimator results, in execution order. Partial when interrupted.
    pub results: Vec<AlgorithmResult>,
    /// Why fusion produced no offset.
    pub rejection: Option<Rejection>,
    /// Advisory threshold from the options.
    pub min_confidence: f64,
    /// Wall time of the whole call.
    pub elapsed: Duration,
}

impl SyncReport {
    pub(crate) fn from_fused(
        fused: FusedEstimate,
        content: ContentLabel,
        window: AnalysisWindow,
        results: Vec<AlgorithmResult>,
        min_confidence: f64,
    ) -> Self {
        let status = if fused.is_abstain() {
            SyncStatus::Abstain
        } else {
            SyncStatus::Ok
        };
        Self {
            status,
            offset_seconds: if fused.is_abstain() { 0.0 } else { fused.offset_seconds },
            confidence: fused.confidence,
            content,
            window: Some(window),
            results,
            rejection: fused.rejection,
            min_confidence,
            elapsed: Duration::ZERO,
        }
    }

    /// Abstaining report for a call that never reached fusion.
    pub(crate) fn rejected(
        rejection: Rejection,
        window: AnalysisWindow,
        min_confidence: f64,
    ) -> Self {
        Self {
            status: SyncStatus::Abstain,
            offset_seconds: 0.0,
            confidence: 0.0,
            content: ContentLabel::Unknown,
            window: Some(window),
            results: Vec::new(),
            rejection: Some(rejection),
            min_confidence,
            elapsed: Duration::ZERO,
        }
    }

    /// Report for a call stopped by cancellation or its deadline.
    pub(crate) fn interrupted(
        interrupt: Interrupt,
        window: Option<AnalysisWindow>,
        results: Vec<AlgorithmResult>,
        min_confidence: f64,
    ) -> Self {
        Self {
            status: interrupt.into(),
            offset_seconds: 0.0,
            confidence: 0.0,
            content: ContentLabel::Unknown,
            window,
            results,
            rejection: None,
            min_confidence,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub(crate) fn with_content(mut self, content: ContentLabel) -> Self {
        self.content = content;
        self
    }

    /// Algorithm tag of the fused estimate.
    pub fn algorithm(&self) -> &'static str {
        FUSED_ALGORITHM
    }

    pub fn is_ok(&self) -> bool {
        self.status == SyncStatus::Ok
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_confidence(self.confidence)
    }

    /// True when the report is `Ok` and reaches the advisory threshold.
    pub fn meets_min_confidence(&self) -> bool {
        self.is_ok() && self.confidence >= self.min_confidence
    }

    /// Offset in milliseconds, rounded.
    pub fn offset_ms(&self) -> i64 {
        (self.offset_seconds * 1000.0).round() as i64
    }

    /// Result of one estimator, if it ran.
    pub fn result_for(&self, kind: AlgorithmKind) -> Option<&AlgorithmResult> {
        self.results.iter().find(|r| r.algorithm == kind)
    }
}
