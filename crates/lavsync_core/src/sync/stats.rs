//! Running statistics over many synchronization reports.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{AlgorithmKind, ConfidenceBand};

use super::result::SyncReport;

/// Batch summary accumulated with [`SyncStatistics::record`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub total: usize,
    /// Reports with non-zero confidence.
    pub successful: usize,
    /// Reports in the high confidence band.
    pub high_confidence: usize,
    /// Successful reports below the usable threshold.
    pub low_confidence: usize,
    /// Mean confidence over successful reports.
    pub mean_confidence: f64,
    /// Mean wall time over all reports.
    pub mean_elapsed: Duration,
    /// How often each estimator produced a non-abstaining result.
    pub contributions: BTreeMap<AlgorithmKind, usize>,
}

impl SyncStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one report.
    pub fn record(&mut self, report: &SyncReport) {
        self.total += 1;

        if report.confidence > 0.0 {
            self.successful += 1;
            let n = self.successful as f64;
            self.mean_confidence += (report.confidence - self.mean_confidence) / n;

            match report.band() {
                ConfidenceBand::High => self.high_confidence += 1,
                ConfidenceBand::Reject => self.low_confidence += 1,
                ConfidenceBand::Usable => {}
            }
        }

        let total_nanos = self.mean_elapsed.as_nanos() * (self.total as u128 - 1)
            + report.elapsed.as_nanos();
        let mean = total_nanos / self.total as u128;
        self.mean_elapsed = Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX));

        for result in report.results.iter().filter(|r| !r.is_abstain()) {
            *self.contributions.entry(result.algorithm).or_default() += 1;
        }
    }

    /// Share of reports with an offset, in [0, 1].
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64
    }

    /// Log a summary at info level.
    pub fn log_summary(&self) {
        tracing::info!(
            "Synchronized {}/{} ({:.1}%), {} high confidence, {} low confidence, \
             mean confidence {:.3}, mean time {:.2}s",
            self.successful,
            self.total,
            self.success_rate() * 100.0,
            self.high_confidence,
            self.low_confidence,
            self.mean_confidence,
            self.mean_elapsed.as_secs_f64()
        );
        for (kind, count) in &self.contributions {
            tracing::info!("  {}: {} results", kind, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AbstainReason, AlgorithmResult, AnalysisWindow, FusedEstimate};
    use crate::models::ContentLabel;

    fn report(confidence: f64, millis: u64) -> SyncReport {
        let fused = FusedEstimate {
            offset_seconds: 0.5,
            confidence,
            contributors: 1,
            rejection: None,
        };
        let results = vec![
            AlgorithmResult::estimate(AlgorithmKind::CrossCorrelation, 0.5, confidence),
            AlgorithmResult::abstain(AlgorithmKind::Onset, AbstainReason::TooFewOnsets),
        ];
        SyncReport::from_fused(
            fused,
            ContentLabel::Speech,
            AnalysisWindow::new(0.0, 10.0),
            results,
            0.3,
        )
        .with_elapsed(Duration::from_millis(millis))
    }

    #[test]
    fn counts_by_band() {
        let mut stats = SyncStatistics::new();
        stats.record(&report(0.9, 100));
        stats.record(&report(0.5, 200));
        stats.record(&report(0.1, 300));
        stats.record(&report(0.0, 400));

        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.high_confidence, 1);
        assert_eq!(stats.low_confidence, 1);
        assert!((stats.mean_confidence - 0.5).abs() < 1e-12);
        assert_eq!(stats.mean_elapsed, Duration::from_millis(250));
        assert!((stats.success_rate() - 0.75).abs() < 1e-12);
        assert_eq!(stats.contributions.get(&AlgorithmKind::CrossCorrelation), Some(&3));
        assert!(!stats.contributions.contains_key(&AlgorithmKind::Onset));
    }

    #[test]
    fn empty_statistics() {
        let stats = SyncStatistics::new();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.mean_elapsed, Duration::ZERO);
    }
}
