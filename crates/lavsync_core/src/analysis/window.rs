//! Analysis-window selection.
//!
//! Pure functions: no I/O, deterministic output. The reference window sits in
//! the middle of source `a`, where content is most likely; the other source
//! is searched over the same window widened by the offset margin.

use serde::{Deserialize, Serialize};

use crate::analysis::types::AnalysisWindow;
use crate::config::AnalysisSettings;

/// Window sizing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Shortest window used when both sources allow it, in seconds.
    pub min_window: f64,
    /// Longest window, in seconds.
    pub max_window: f64,
    /// Share of the shorter source to capture.
    pub fraction: f64,
    /// Windows shorter than this cannot produce a result.
    pub min_usable: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_window: 10.0,
            max_window: 30.0,
            fraction: 0.3,
            min_usable: 2.0,
        }
    }
}

impl WindowConfig {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            min_window: settings.min_window_seconds,
            max_window: settings.max_window_seconds.max(settings.min_window_seconds),
            fraction: settings.window_fraction,
            min_usable: settings.min_usable_seconds,
        }
    }
}

/// Pick the reference window from the two source durations.
///
/// `explicit` is honored but clipped to source `a`. Returns None when no
/// positive-length window fits.
pub fn select_window(
    duration_a: f64,
    duration_b: f64,
    config: &WindowConfig,
    explicit: Option<AnalysisWindow>,
) -> Option<AnalysisWindow> {
    if !(duration_a > 0.0 && duration_b > 0.0) {
        return None;
    }

    let window = match explicit {
        Some(requested) => {
            let start = requested.start_seconds.clamp(0.0, duration_a);
            let duration = requested.duration_seconds.min(duration_a - start);
            AnalysisWindow::new(start, duration)
        }
        None => {
            let shorter = duration_a.min(duration_b);
            let duration = if shorter < config.min_window {
                shorter
            } else {
                (config.fraction * shorter).clamp(config.min_window, config.max_window)
            };
            let start = ((duration_a - duration) / 2.0).max(0.0);
            AnalysisWindow::new(start, duration)
        }
    };

    if window.duration_seconds > 0.0 {
        Some(window)
    } else {
        None
    }
}

/// Range of source `b` to decode: the reference window widened by `margin`
/// on both sides, clipped to `[0, duration_b]`.
///
/// The start lies a whole number of `hop_seconds` before the reference start,
/// so frames of both sources fall on one grid. It reaches back at least
/// `margin` unless the source begins first. A non-positive hop disables the
/// snapping.
pub fn search_range(
    reference: &AnalysisWindow,
    duration_b: f64,
    margin: f64,
    hop_seconds: f64,
) -> Option<AnalysisWindow> {
    let start = if hop_seconds > 0.0 && hop_seconds.is_finite() {
        let wanted = (margin / hop_seconds).ceil();
        let available = (reference.start_seconds / hop_seconds).floor();
        let hops = wanted.min(available).max(0.0);
        (reference.start_seconds - hops * hop_seconds).max(0.0)
    } else {
        (reference.start_seconds - margin).max(0.0)
    };
    let end = (reference.end_seconds() + margin).min(duration_b);
    if end > start {
        Some(AnalysisWindow::new(start, end - start))
    } else {
        None
    }
}

/// True if the reference window shifted by `offset` stays inside source `b`,
/// allowing `tolerance` seconds of slack at either edge.
pub fn fits_source(
    reference: &AnalysisWindow,
    offset: f64,
    duration_b: f64,
    tolerance: f64,
) -> bool {
    let shifted = reference.shifted(offset);
    shifted.start_seconds >= -tolerance && shifted.end_seconds() <= duration_b + tolerance
}
