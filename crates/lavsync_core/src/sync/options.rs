//! Per-call synchronization options.

use std::time::{Duration, Instant};

use crate::analysis::AnalysisWindow;
use crate::config::AnalysisSettings;
use crate::models::SyncQuality;

use super::control::{CancelToken, Checkpoint};
use super::result::SyncError;

/// Options for one `synchronize` call.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub quality: SyncQuality,
    /// Largest offset that may be reported, in seconds.
    pub max_offset_seconds: f64,
    /// Advisory threshold copied into the report. Does not affect analysis.
    pub min_confidence: f64,
    /// Explicit reference window in source `a`.
    pub search_window: Option<AnalysisWindow>,
    pub cancellation: Option<CancelToken>,
    /// Wall-clock limit for the whole call.
    pub deadline: Option<Instant>,
    /// Run the estimators on the rayon pool.
    pub parallel: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

impl SyncOptions {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            quality: settings.quality,
            max_offset_seconds: settings.max_offset_seconds,
            min_confidence: settings.min_confidence,
            search_window: None,
            cancellation: None,
            deadline: None,
            parallel: settings.parallel,
        }
    }

    pub fn with_quality(mut self, quality: SyncQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_offset(mut self, seconds: f64) -> Self {
        self.max_offset_seconds = seconds;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Analyze `a` over `[start, start + duration)` instead of the automatic
    /// window. Useful for narrowing the search around a cached offset.
    pub fn with_search_window(mut self, start_seconds: f64, duration_seconds: f64) -> Self {
        self.search_window = Some(AnalysisWindow::new(start_seconds, duration_seconds));
        self
    }

    pub fn with_cancellation(mut self, token: CancelToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject options the analysis cannot honor.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !(self.max_offset_seconds.is_finite() && self.max_offset_seconds > 0.0) {
            return Err(SyncError::invalid_options(format!(
                "max_offset_seconds must be positive, got {}",
                self.max_offset_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SyncError::invalid_options(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if let Some(window) = &self.search_window {
            let start_ok = window.start_seconds.is_finite() && window.start_seconds >= 0.0;
            let duration_ok = window.duration_seconds.is_finite() && window.duration_seconds > 0.0;
            if !(start_ok && duration_ok) {
                return Err(SyncError::invalid_options(format!(
                    "search window ({}, {}) needs start >= 0 and duration > 0",
                    window.start_seconds, window.duration_seconds
                )));
            }
        }
        Ok(())
    }

    /// Checkpoint combining the token and deadline.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.cancellation.clone(), self.deadline)
    }
}
