//! Synchronization engine.
//!
//! Orchestrates one call:
//! 1. Query both source durations
//! 2. Select the reference window in `a` and the search range in `b`
//! 3. Decode and extract features for both ranges
//! 4. Classify the reference window
//! 5. Run the estimators, gate their offsets and fuse

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::analysis::{
    classify, default_algorithms, fits_source, search_range, select_window, AbstainReason,
    AlgorithmResult, AnalysisWindow, FeatureBundle, FeatureConfig, FeatureExtractor, FftCache,
    Fusion, PcmBuffer, Rejection, RunContext, SyncAlgorithm, WeightTable, WindowConfig,
};
use crate::config::Settings;
use crate::decode::{DecodeError, DecodeRequest, Decoder};
use crate::models::{ContentLabel, MediaRef};

use super::control::{Checkpoint, Interrupt};
use super::options::SyncOptions;
use super::result::{SyncError, SyncReport};

/// Why a call stopped before producing a report.
enum Stop {
    Failed(SyncError),
    Interrupted(Interrupt),
}

impl From<SyncError> for Stop {
    fn from(err: SyncError) -> Self {
        Stop::Failed(err)
    }
}

impl From<Interrupt> for Stop {
    fn from(interrupt: Interrupt) -> Self {
        Stop::Interrupted(interrupt)
    }
}

/// Estimates the offset between two recordings.
///
/// Holds configuration, the estimator set and the FFT plan cache; no state
/// carries over between calls, so one engine may serve several threads.
pub struct SyncEngine {
    decoder: Arc<dyn Decoder>,
    sample_rate: u32,
    window: WindowConfig,
    fft: Arc<FftCache>,
    extractor: FeatureExtractor,
    algorithms: Vec<Box<dyn SyncAlgorithm>>,
    fusion: Fusion,
}

impl SyncEngine {
    /// Engine with default settings.
    pub fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self::from_settings(decoder, &Settings::default())
    }

    pub fn from_settings(decoder: Arc<dyn Decoder>, settings: &Settings) -> Self {
        let fft = Arc::new(FftCache::new());
        let extractor = FeatureExtractor::new(
            FeatureConfig::from_settings(&settings.features),
            Arc::clone(&fft),
        );
        Self {
            decoder,
            sample_rate: settings.analysis.sample_rate,
            window: WindowConfig::from_settings(&settings.analysis),
            fft,
            extractor,
            algorithms: default_algorithms(),
            fusion: Fusion::default(),
        }
    }

    /// Replace the fusion weight table.
    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.fusion = Fusion::new(weights);
        self
    }

    /// Replace the estimator set. Results keep the order given here.
    pub fn with_algorithms(mut self, algorithms: Vec<Box<dyn SyncAlgorithm>>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Sample rate requested from the decoder.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn window_config(&self) -> &WindowConfig {
        &self.window
    }

    /// Estimate the offset of `b` relative to `a`.
    ///
    /// Returns `Err` only for invalid options or input and for decoder
    /// failures. Everything else, including cancellation and deadlines, is
    /// reported through [`SyncReport::status`].
    pub fn synchronize(
        &self,
        a: &MediaRef,
        b: &MediaRef,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        options.validate()?;

        let started = Instant::now();
        let checkpoint = options.checkpoint();
        tracing::debug!("Synchronizing {} against reference {}", b, a);

        let report = match self.run(a, b, options, &checkpoint) {
            Ok(report) => report,
            Err(Stop::Interrupted(interrupt)) => {
                tracing::warn!("Synchronization {} before any estimate", interrupt);
                SyncReport::interrupted(interrupt, None, Vec::new(), options.min_confidence)
            }
            Err(Stop::Failed(err)) => {
                tracing::warn!("Synchronization of {} failed: {}", b, err);
                return Err(err);
            }
        };
        let report = report.with_elapsed(started.elapsed());

        tracing::info!(
            "{} vs {}: {} offset={:.3}s confidence={:.3} content={} ({:.2}s)",
            a,
            b,
            report.status,
            report.offset_seconds,
            report.confidence,
            report.content,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Decode `[start, start + duration)` of `media` and extract its features.
    pub fn extract_features(
        &self,
        media: &MediaRef,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<FeatureBundle, SyncError> {
        let valid_range = start_seconds.is_finite()
            && start_seconds >= 0.0
            && duration_seconds.is_finite()
            && duration_seconds > 0.0;
        if !valid_range {
            return Err(SyncError::invalid_input(format!(
                "range ({}, {}) needs start >= 0 and duration > 0",
                start_seconds, duration_seconds
            )));
        }

        let checkpoint = Checkpoint::unbounded();
        let features = self
            .duration(media)
            .and_then(|total| {
                let window = AnalysisWindow::new(start_seconds, duration_seconds);
                let pcm = self.decode(media, window)?;
                let bundle = self.extractor.extract(&pcm, &checkpoint)?;
                Ok(bundle.with_source_duration(total))
            });

        features.map_err(|stop| match stop {
            Stop::Failed(err) => err,
            Stop::Interrupted(interrupt) => SyncError::Interrupted(interrupt),
        })
    }

    /// Label a feature bundle.
    pub fn classify(&self, features: &FeatureBundle) -> ContentLabel {
        classify(features)
    }

    fn run(
        &self,
        a: &MediaRef,
        b: &MediaRef,
        options: &SyncOptions,
        checkpoint: &Checkpoint,
    ) -> Result<SyncReport, Stop> {
        checkpoint.check()?;

        let duration_a = self.duration(a)?;
        let duration_b = self.duration(b)?;

        let window = select_window(duration_a, duration_b, &self.window, options.search_window)
            .ok_or_else(|| {
                SyncError::invalid_input(format!(
                    "no analysis window fits {} ({:.3}s)",
                    a, duration_a
                ))
            })?;
        let window = window.snapped_to(self.sample_rate);
        let usable = window.duration_seconds >= self.window.min_usable;
        let max_offset = options.max_offset_seconds;

        tracing::debug!(
            "Reference window {:.3}s..{:.3}s (durations {:.3}s / {:.3}s)",
            window.start_seconds,
            window.end_seconds(),
            duration_a,
            duration_b
        );

        let hop = self.hop_seconds();
        let Some(range_b) = search_range(&window, duration_b, max_offset, hop) else {
            tracing::warn!(
                "{} ({:.3}s) ends before the search range of the reference window",
                b,
                duration_b
            );
            return Ok(SyncReport::rejected(
                Rejection::NoSupport,
                window,
                options.min_confidence,
            ));
        };
        tracing::debug!(
            "Search range in {}: {:.3}s..{:.3}s",
            b,
            range_b.start_seconds,
            range_b.end_seconds()
        );

        let pcm_a = self.decode(a, window)?;
        let pcm_b = self.decode(b, range_b)?;

        checkpoint.check()?;
        let features_a = self
            .extractor
            .extract(&pcm_a, checkpoint)?
            .with_source_duration(duration_a);
        let features_b = self
            .extractor
            .extract(&pcm_b, checkpoint)?
            .with_source_duration(duration_b);
        drop(pcm_a);
        drop(pcm_b);

        let content = classify(&features_a);

        let results = if usable {
            let ctx = RunContext {
                quality: options.quality,
                fft: &self.fft,
                checkpoint,
            };
            self.run_algorithms(&features_a, &features_b, &ctx, options.parallel)
        } else {
            tracing::warn!(
                "Analysis window of {:.3}s is shorter than {:.3}s",
                window.duration_seconds,
                self.window.min_usable
            );
            Vec::new()
        };

        if results
            .iter()
            .any(|r| r.abstain_reason == Some(AbstainReason::Interrupted))
        {
            let interrupt = checkpoint.check().err().unwrap_or(Interrupt::Cancelled);
            tracing::warn!("Synchronization {} after {} estimators", interrupt, results.len());
            return Ok(SyncReport::interrupted(
                interrupt,
                Some(window),
                results,
                options.min_confidence,
            )
            .with_content(content));
        }

        let tolerance = features_b.frame_seconds();
        let results: Vec<AlgorithmResult> = results
            .into_iter()
            .map(|r| gate(r, &window, duration_b, tolerance, max_offset))
            .collect();

        let fused = self
            .fusion
            .fuse(&results, content, &features_a, &features_b, max_offset, usable);
        if let Some(rejection) = fused.rejection {
            tracing::debug!("Fusion rejected: {}", rejection);
        }

        Ok(SyncReport::from_fused(
            fused,
            content,
            window,
            results,
            options.min_confidence,
        ))
    }

    fn run_algorithms(
        &self,
        reference: &FeatureBundle,
        other: &FeatureBundle,
        ctx: &RunContext<'_>,
        parallel: bool,
    ) -> Vec<AlgorithmResult> {
        if parallel {
            return self
                .algorithms
                .par_iter()
                .map(|algorithm| run_one(algorithm.as_ref(), reference, other, ctx))
                .collect();
        }

        let mut results = Vec::with_capacity(self.algorithms.len());
        for algorithm in &self.algorithms {
            let result = run_one(algorithm.as_ref(), reference, other, ctx);
            let interrupted = result.abstain_reason == Some(AbstainReason::Interrupted);
            results.push(result);
            if interrupted {
                break;
            }
        }
        results
    }

    fn hop_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.extractor.config().hop_size as f64 / self.sample_rate as f64
    }

    fn duration(&self, media: &MediaRef) -> Result<f64, Stop> {
        let duration = self
            .decoder
            .duration(media)
            .map_err(|e| decode_stop(media, e))?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(SyncError::invalid_input(format!(
                "{} has duration {}",
                media, duration
            ))
            .into());
        }
        Ok(duration)
    }

    fn decode(&self, media: &MediaRef, window: AnalysisWindow) -> Result<PcmBuffer, Stop> {
        let request = DecodeRequest::mono(
            window.start_seconds,
            window.duration_seconds,
            self.sample_rate,
        );
        let pcm = self
            .decoder
            .decode(media, &request)
            .map_err(|e| decode_stop(media, e))?;
        pcm.validate(self.sample_rate)
            .map_err(|e| SyncError::invalid_pcm(media, e))?;

        tracing::debug!(
            "Decoded {:.3}s of {} at {:.3}s",
            pcm.duration_secs(),
            media,
            pcm.start_seconds
        );
        Ok(pcm)
    }
}

fn decode_stop(media: &MediaRef, err: DecodeError) -> Stop {
    match err {
        DecodeError::Cancelled => Stop::Interrupted(Interrupt::Cancelled),
        other => Stop::Failed(SyncError::decode(media, other)),
    }
}

fn run_one(
    algorithm: &dyn SyncAlgorithm,
    reference: &FeatureBundle,
    other: &FeatureBundle,
    ctx: &RunContext<'_>,
) -> AlgorithmResult {
    if ctx.checkpoint.check().is_err() {
        return AlgorithmResult::abstain(algorithm.kind(), AbstainReason::Interrupted);
    }

    let started = Instant::now();
    let result = algorithm
        .run(reference, other, ctx)
        .with_elapsed(started.elapsed());

    match result.abstain_reason {
        Some(reason) => tracing::debug!("{}: abstained ({})", algorithm.kind(), reason),
        None => tracing::debug!(
            "{}: offset={:.4}s confidence={:.3} in {:.1}ms",
            algorithm.kind(),
            result.offset_seconds,
            result.confidence,
            result.elapsed.as_secs_f64() * 1000.0
        ),
    }
    result
}

/// Turn offsets that leave the search range or the other source into
/// abstentions.
fn gate(
    result: AlgorithmResult,
    window: &AnalysisWindow,
    duration_b: f64,
    tolerance: f64,
    max_offset: f64,
) -> AlgorithmResult {
    if result.is_abstain() {
        return result;
    }

    let reason = if result.offset_seconds.abs() > max_offset {
        AbstainReason::OutsideSearchRange
    } else if !fits_source(window, result.offset_seconds, duration_b, tolerance) {
        AbstainReason::OutsideSource
    } else {
        return result;
    };

    tracing::warn!(
        "{}: offset {:.3}s rejected ({})",
        result.algorithm,
        result.offset_seconds,
        reason
    );
    AlgorithmResult::abstain(result.algorithm, reason).with_elapsed(result.elapsed)
}
