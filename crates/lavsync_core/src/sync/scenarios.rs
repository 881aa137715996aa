//! End-to-end synchronization against in-memory sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::methods::OnsetAlignment;
use crate::analysis::{
    AbstainReason, AlgorithmResult, AnalysisWindow, FeatureBundle, PcmBuffer, Rejection,
    RunContext, SyncAlgorithm,
};
use crate::decode::{DecodeError, DecodeRequest, DecodeResult, Decoder, MemoryDecoder};
use crate::models::{AlgorithmKind, ContentLabel, MediaRef, SyncQuality};
use crate::test_signals;

use super::{CancelToken, SyncEngine, SyncOptions, SyncReport, SyncStatus};

const SR: u32 = 44100;
/// One feature hop at 44.1 kHz, in seconds.
const HOP: f64 = 512.0 / 44100.0;

fn engine_for(a: Vec<f64>, b: Vec<f64>) -> SyncEngine {
    let decoder = MemoryDecoder::new()
        .with_source("a.wav", a, SR)
        .with_source("b.wav", b, SR);
    SyncEngine::new(Arc::new(decoder))
}

fn run_with(a: Vec<f64>, b: Vec<f64>, options: &SyncOptions) -> SyncReport {
    crate::logging::init_test_tracing();
    let report = engine_for(a, b)
        .synchronize(&"a.wav".into(), &"b.wav".into(), options)
        .unwrap();
    check_invariants(&report, options);
    report
}

fn run(a: Vec<f64>, b: Vec<f64>) -> SyncReport {
    run_with(a, b, &SyncOptions::default())
}

fn check_invariants(report: &SyncReport, options: &SyncOptions) {
    assert!(report.offset_seconds.is_finite());
    assert!(report.offset_seconds.abs() <= options.max_offset_seconds);
    assert!((0.0..=1.0).contains(&report.confidence), "{}", report.confidence);

    let all_abstain = report.results.iter().all(AlgorithmResult::is_abstain);
    assert_eq!(report.confidence == 0.0, all_abstain, "{:?}", report.results);
    if report.status == SyncStatus::Abstain {
        assert_eq!(report.offset_seconds, 0.0);
    }
}

fn assert_offset(report: &SyncReport, expected: f64, tolerance: f64) {
    assert_eq!(report.status, SyncStatus::Ok, "{:?}", report);
    assert!(
        (report.offset_seconds - expected).abs() <= tolerance,
        "offset {} expected {} ± {}; trace {:?}",
        report.offset_seconds,
        expected,
        tolerance,
        report.results
    );
}

#[test]
fn delayed_tone() {
    let a = test_signals::tone(1000.0, 10.0, SR, 0.5);
    let b = test_signals::shift(&a, 2.0, SR);
    let report = run(a, b);

    assert_offset(&report, 2.0, 0.010);
    assert!(report.confidence >= 0.8, "confidence {}", report.confidence);
    assert_eq!(report.window, Some(AnalysisWindow::new(0.0, 10.0)));
}

#[test]
fn speech_starting_early() {
    let a = test_signals::speech(30.0, SR, 2);
    let b = test_signals::shift(&a, -1.25, SR);
    let report = run(a, b);

    assert_offset(&report, -1.25, 0.050);
    assert!(report.confidence >= 0.6, "confidence {}", report.confidence);
}

#[test]
fn percussive_music_delayed() {
    let a = test_signals::music(30.0, SR, 3);
    let b = test_signals::shift(&a, 5.0, SR);
    let report = run(a, b);

    assert_offset(&report, 5.0, 0.030);
    assert!(report.confidence >= 0.75, "confidence {}", report.confidence);
    let onset = report.result_for(AlgorithmKind::Onset).unwrap();
    assert!(!onset.is_abstain(), "{:?}", onset);
}

#[test]
fn silence_abstains() {
    let report = run(test_signals::silence(20.0, SR), test_signals::silence(20.0, SR));

    assert_eq!(report.status, SyncStatus::Abstain);
    assert_eq!(report.confidence, 0.0);
    assert_eq!(report.offset_seconds, 0.0);
    assert_eq!(report.content, ContentLabel::Silence);
    assert_eq!(report.rejection, Some(Rejection::NoSupport));
}

#[test]
fn speech_against_unrelated_noise_abstains() {
    let a = test_signals::speech(15.0, SR, 5);
    let b = test_signals::noise(15.0, SR, 0.3, 99);
    let report = run(a, b);

    assert_eq!(report.status, SyncStatus::Abstain, "{:?}", report.results);
    assert_eq!(report.confidence, 0.0);
}

#[test]
fn offset_beyond_maximum_abstains() {
    let a = test_signals::speech(60.0, SR, 6);
    let b = test_signals::shift(&a, 40.0, SR);
    let options = SyncOptions::default().with_max_offset(30.0);
    let report = run_with(a, b, &options);

    assert_eq!(report.status, SyncStatus::Abstain, "{:?}", report.results);
    assert_eq!(report.confidence, 0.0);
    assert_eq!(report.offset_seconds, 0.0);
}

#[test]
fn identical_sources_align_at_zero() {
    let a = test_signals::speech(30.0, SR, 8);
    let report = run(a.clone(), a);

    assert_offset(&report, 0.0, HOP);
    assert!(report.confidence >= 0.8, "confidence {}", report.confidence);
}

#[test]
fn dtw_contributes_when_the_window_is_off_the_frame_grid() {
    // 10 s is not a whole number of hops into either source
    for a in [test_signals::speech(30.0, SR, 31), test_signals::music(30.0, SR, 32)] {
        let report = run(a.clone(), a);
        assert_eq!(report.window, Some(AnalysisWindow::new(10.0, 10.0)));

        let dtw = report.result_for(AlgorithmKind::Dtw).unwrap();
        assert!(!dtw.is_abstain(), "dtw abstained: {:?}", dtw.abstain_reason);
        assert!(dtw.offset_seconds.abs() < 1e-9, "dtw offset {}", dtw.offset_seconds);
        assert!(dtw.confidence > 0.99, "dtw confidence {}", dtw.confidence);
        assert_offset(&report, 0.0, HOP);
    }
}

#[test]
fn swapping_sources_negates_offset() {
    let a = test_signals::speech(30.0, SR, 9);
    let b = test_signals::shift(&a, 0.8, SR);

    let forward = run(a.clone(), b.clone());
    let backward = run(b, a);

    assert_offset(&forward, 0.8, 0.05);
    assert_offset(&backward, -0.8, 0.05);
    assert!(
        (forward.offset_seconds + backward.offset_seconds).abs() <= 2.0 * HOP,
        "{} vs {}",
        forward.offset_seconds,
        backward.offset_seconds
    );
}

#[test]
fn applying_the_offset_realigns() {
    let a = test_signals::speech(30.0, SR, 21);
    let b = test_signals::shift(&a, 1.7, SR);

    let first = run(a.clone(), b.clone());
    assert_offset(&first, 1.7, 0.05);

    let aligned = test_signals::shift(&b, -first.offset_seconds, SR);
    let second = run(a, aligned);
    assert_offset(&second, 0.0, 2.0 * HOP);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let a = test_signals::music(20.0, SR, 12);
    let b = test_signals::shift(&a, 0.6, SR);
    let engine = engine_for(a, b);
    let options = SyncOptions::default();

    let first = engine.synchronize(&"a.wav".into(), &"b.wav".into(), &options).unwrap();
    let second = engine.synchronize(&"a.wav".into(), &"b.wav".into(), &options).unwrap();
    assert_same_outcome(&first, &second);
}

#[test]
fn parallel_matches_sequential() {
    let a = test_signals::speech(30.0, SR, 13);
    let b = test_signals::shift(&a, -0.4, SR);
    let engine = engine_for(a, b);

    let sequential = SyncOptions::default();
    let parallel = SyncOptions::default().with_parallel(true);
    let first = engine.synchronize(&"a.wav".into(), &"b.wav".into(), &sequential).unwrap();
    let second = engine.synchronize(&"a.wav".into(), &"b.wav".into(), &parallel).unwrap();
    assert_same_outcome(&first, &second);
}

fn assert_same_outcome(first: &SyncReport, second: &SyncReport) {
    assert_eq!(first.status, second.status);
    assert_eq!(first.offset_seconds.to_bits(), second.offset_seconds.to_bits());
    assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
    assert_eq!(first.results.len(), second.results.len());
    for (x, y) in first.results.iter().zip(&second.results) {
        assert_eq!(x.algorithm, y.algorithm);
        assert_eq!(x.offset_seconds.to_bits(), y.offset_seconds.to_bits());
        assert_eq!(x.confidence.to_bits(), y.confidence.to_bits());
        assert_eq!(x.abstain_reason, y.abstain_reason);
    }
}

#[test]
fn real_time_quality_still_aligns() {
    let a = test_signals::speech(30.0, SR, 14);
    let b = test_signals::shift(&a, 3.0, SR);
    let options = SyncOptions::default().with_quality(SyncQuality::RealTime);
    let report = run_with(a, b, &options);
    assert_offset(&report, 3.0, 0.05);
}

#[test]
fn explicit_search_window_is_used() {
    let a = test_signals::speech(30.0, SR, 15);
    let b = test_signals::shift(&a, -1.25, SR);
    let options = SyncOptions::default().with_search_window(5.0, 8.0);
    let report = run_with(a, b, &options);

    assert_eq!(report.window, Some(AnalysisWindow::new(5.0, 8.0)));
    assert_offset(&report, -1.25, 0.05);
}

#[test]
fn clipped_input_stays_finite() {
    let clipped: Vec<f64> = test_signals::tone(440.0, 12.0, SR, 1.0)
        .into_iter()
        .map(f64::signum)
        .collect();
    let b = test_signals::shift(&clipped, 0.5, SR);
    let report = run(clipped, b);

    assert!(report.offset_seconds.is_finite());
    assert!(report.confidence.is_finite());
    for result in &report.results {
        assert!(result.offset_seconds.is_finite() && result.confidence.is_finite());
    }
}

#[test]
fn sources_shorter_than_usable_window_abstain() {
    let a = test_signals::speech(1.5, SR, 16);
    let report = run(a.clone(), a);

    assert_eq!(report.status, SyncStatus::Abstain);
    assert_eq!(report.rejection, Some(Rejection::WindowTooShort));
    assert!(report.results.is_empty());
    assert_eq!(report.window.map(|w| w.duration_seconds), Some(1.5));
}

#[test]
fn other_source_outside_search_range_abstains() {
    let a = test_signals::speech(100.0, SR, 17);
    let b = test_signals::speech(5.0, SR, 18);
    let report = run(a, b);

    assert_eq!(report.status, SyncStatus::Abstain);
    assert_eq!(report.rejection, Some(Rejection::NoSupport));
}

#[test]
fn cancelled_before_start() {
    let token = CancelToken::new();
    token.cancel();
    let options = SyncOptions::default().with_cancellation(token);
    let a = test_signals::speech(20.0, SR, 19);
    let report = run_with(a.clone(), a, &options);

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.confidence, 0.0);
    assert!(report.results.is_empty());
}

#[test]
fn expired_deadline_times_out() {
    let options = SyncOptions::default().with_deadline(Instant::now() - Duration::from_millis(5));
    let a = test_signals::speech(20.0, SR, 20);
    let report = run_with(a.clone(), a, &options);

    assert_eq!(report.status, SyncStatus::Timeout);
    assert_eq!(report.offset_seconds, 0.0);
}

/// Cancels the call from inside the first estimator.
struct CancelOnRun {
    token: CancelToken,
}

impl SyncAlgorithm for CancelOnRun {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::CrossCorrelation
    }

    fn description(&self) -> &str {
        "cancels the running call"
    }

    fn run(&self, _: &FeatureBundle, _: &FeatureBundle, _: &RunContext<'_>) -> AlgorithmResult {
        self.token.cancel();
        AlgorithmResult::estimate(self.kind(), 0.25, 0.5)
    }
}

#[test]
fn cancellation_between_estimators_keeps_partial_trace() {
    let token = CancelToken::new();
    let a = test_signals::speech(20.0, SR, 22);
    let engine = engine_for(a.clone(), a).with_algorithms(vec![
        Box::new(CancelOnRun {
            token: token.clone(),
        }),
        Box::new(OnsetAlignment::default()),
    ]);
    let options = SyncOptions::default().with_cancellation(token);

    let report = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &options)
        .unwrap();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.confidence, 0.0);
    assert_eq!(report.offset_seconds, 0.0);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].confidence, 0.5);
    assert_eq!(report.results[1].abstain_reason, Some(AbstainReason::Interrupted));
}

/// Decoder that reports cancellation for every request.
struct CancellingDecoder;

impl Decoder for CancellingDecoder {
    fn decode(&self, _: &MediaRef, _: &DecodeRequest) -> DecodeResult<PcmBuffer> {
        Err(DecodeError::Cancelled)
    }

    fn duration(&self, _: &MediaRef) -> DecodeResult<f64> {
        Ok(30.0)
    }
}

#[test]
fn decoder_cancellation_is_reported_as_cancelled() {
    let engine = SyncEngine::new(Arc::new(CancellingDecoder));
    let report = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &SyncOptions::default())
        .unwrap();
    assert_eq!(report.status, SyncStatus::Cancelled);
}

#[test]
fn missing_source_is_a_decode_failure() {
    let engine = engine_for(test_signals::speech(10.0, SR, 23), Vec::new());
    let err = engine
        .synchronize(&"a.wav".into(), &"missing.wav".into(), &SyncOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), SyncStatus::DecodeFailed);
    assert!(err.to_string().contains("missing.wav"));
}

#[test]
fn empty_source_is_invalid_input() {
    let engine = engine_for(test_signals::speech(10.0, SR, 24), Vec::new());
    let err = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &SyncOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), SyncStatus::InputInvalid);
}

#[test]
fn non_finite_samples_are_invalid_input() {
    let mut a = test_signals::speech(30.0, SR, 25);
    a[15 * SR as usize] = f64::NAN;
    let engine = engine_for(a.clone(), a);
    let err = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &SyncOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), SyncStatus::InputInvalid);
}

#[test]
fn samples_beyond_full_scale_are_invalid_input() {
    let mut a = test_signals::speech(30.0, SR, 26);
    a[15 * SR as usize] = 1.5;
    let engine = engine_for(a.clone(), a);
    let err = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &SyncOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), SyncStatus::InputInvalid);
    assert!(err.to_string().contains("outside [-1, 1]"), "{err}");
}

#[test]
fn invalid_options_are_rejected_before_decoding() {
    let engine = SyncEngine::new(Arc::new(CancellingDecoder));
    let options = SyncOptions::default().with_max_offset(-1.0);
    let err = engine
        .synchronize(&"a.wav".into(), &"b.wav".into(), &options)
        .unwrap_err();
    assert_eq!(err.status(), SyncStatus::InputInvalid);
}

#[test]
fn extract_features_reports_source_position() {
    let engine = engine_for(test_signals::speech(30.0, SR, 26), Vec::new());
    let bundle = engine.extract_features(&"a.wav".into(), 5.0, 10.0).unwrap();

    assert_eq!(bundle.start_seconds, 5.0);
    assert_eq!(bundle.source_duration, Some(30.0));
    assert_eq!(bundle.frame_count(), (441_000 - 2048) / 512 + 1);
    assert_ne!(engine.classify(&bundle), ContentLabel::Unknown);

    assert!(engine.extract_features(&"a.wav".into(), -1.0, 10.0).is_err());
    let err = engine.extract_features(&"nope.wav".into(), 0.0, 1.0).unwrap_err();
    assert_eq!(err.status(), SyncStatus::DecodeFailed);
}

#[test]
fn classify_silence() {
    let engine = engine_for(test_signals::silence(5.0, SR), Vec::new());
    let bundle = engine.extract_features(&"a.wav".into(), 0.0, 5.0).unwrap();
    assert_eq!(engine.classify(&bundle), ContentLabel::Silence);
}
