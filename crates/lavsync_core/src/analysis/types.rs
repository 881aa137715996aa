//! Core types for audio analysis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SpectralBackend;

/// Frames whose RMS stays below this carry no usable signal.
pub const SILENT_ENERGY: f64 = 1e-5;

/// Mono floating-point PCM segment.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Samples in [-1, 1].
    pub samples: Vec<f64>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Position of `samples[0]` in the source, in seconds.
    pub start_seconds: f64,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f64>, sample_rate: u32, start_seconds: f64) -> Self {
        Self {
            samples,
            sample_rate,
            start_seconds,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy out a sub-range given in seconds relative to the buffer start.
    ///
    /// Returns None if the range starts past the end; the tail is truncated.
    pub fn slice(&self, offset_secs: f64, duration_secs: f64) -> Option<PcmBuffer> {
        if self.sample_rate == 0 || offset_secs < 0.0 || duration_secs <= 0.0 {
            return None;
        }
        let sr = self.sample_rate as f64;
        let start = (offset_secs * sr).round() as usize;
        if start >= self.samples.len() {
            return None;
        }
        let end = (start + (duration_secs * sr).round() as usize).min(self.samples.len());

        Some(PcmBuffer::new(
            self.samples[start..end].to_vec(),
            self.sample_rate,
            self.start_seconds + start as f64 / sr,
        ))
    }

    /// Check the invariants the analysis relies on.
    pub fn validate(&self, expected_rate: u32) -> Result<(), PcmError> {
        if self.sample_rate == 0 {
            return Err(PcmError::ZeroSampleRate);
        }
        if self.sample_rate != expected_rate {
            return Err(PcmError::SampleRateMismatch {
                expected: expected_rate,
                actual: self.sample_rate,
            });
        }
        if self.samples.is_empty() {
            return Err(PcmError::Empty);
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(PcmError::NonFinite { index });
        }
        if let Some(index) = self.samples.iter().position(|s| s.abs() > 1.0) {
            return Err(PcmError::OutOfRange {
                index,
                value: self.samples[index],
            });
        }
        Ok(())
    }
}

/// Ways a decoded buffer can violate the PCM contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcmError {
    #[error("sample rate is zero")]
    ZeroSampleRate,

    #[error("sample rate mismatch: requested {expected} Hz, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("buffer contains no samples")]
    Empty,

    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },

    #[error("sample {value} at index {index} is outside [-1, 1]")]
    OutOfRange { index: usize, value: f64 },
}

/// Sub-range of a source selected for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl AnalysisWindow {
    pub fn new(start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            start_seconds,
            duration_seconds,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    /// The same window shifted by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self::new(self.start_seconds + offset, self.duration_seconds)
    }

    /// The same window with its start moved to the nearest whole sample.
    pub fn snapped_to(&self, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return *self;
        }
        let sr = sample_rate as f64;
        Self::new((self.start_seconds * sr).round() / sr, self.duration_seconds)
    }
}

/// Per-frame summary of a PCM buffer.
///
/// All arrays except `onsets` hold one entry per frame. Onsets are strictly
/// increasing frame indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBundle {
    pub frame_size: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
    /// Source time of frame 0, in seconds.
    pub start_seconds: f64,
    /// Duration of the whole source, when known.
    pub source_duration: Option<f64>,
    /// RMS per frame.
    pub energy: Vec<f64>,
    /// Sign changes per frame divided by the frame length.
    pub zcr: Vec<f64>,
    /// Spectral centroid per frame, in Hz.
    pub spectral_centroid: Vec<f64>,
    /// Cepstral coefficients per frame.
    pub mfcc: Vec<Vec<f64>>,
    /// Frame indices of detected onsets.
    pub onsets: Vec<usize>,
    /// How the spectral arrays were produced.
    pub spectral_backend: SpectralBackend,
}

impl FeatureBundle {
    /// A bundle with no frames.
    pub fn empty(frame_size: usize, hop_size: usize, sample_rate: u32, start_seconds: f64) -> Self {
        Self {
            frame_size,
            hop_size,
            sample_rate,
            start_seconds,
            source_duration: None,
            energy: Vec::new(),
            zcr: Vec::new(),
            spectral_centroid: Vec::new(),
            mfcc: Vec::new(),
            onsets: Vec::new(),
            spectral_backend: SpectralBackend::Fft,
        }
    }

    pub fn with_source_duration(mut self, duration: f64) -> Self {
        self.source_duration = Some(duration);
        self
    }

    pub fn frame_count(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Seconds between successive frames.
    pub fn hop_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.hop_size as f64 / self.sample_rate as f64
    }

    /// Seconds spanned by one frame.
    pub fn frame_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_size as f64 / self.sample_rate as f64
    }

    /// Seconds covered by the analyzed samples.
    pub fn span_seconds(&self) -> f64 {
        match self.frame_count() {
            0 => 0.0,
            n => (n - 1) as f64 * self.hop_seconds() + self.frame_seconds(),
        }
    }

    /// True when no frame rises above the silence floor.
    pub fn is_silent(&self) -> bool {
        self.energy.iter().all(|&e| e <= SILENT_ENERGY)
    }

    pub fn has_cepstra(&self) -> bool {
        self.mfcc.iter().any(|c| !c.is_empty())
    }

    /// True when the analyzed range starts or ends at the edge of its source.
    ///
    /// Outside a source boundary there is real silence, so zero padding there
    /// is meaningful; anywhere else it is not.
    pub fn touches_source_boundary(&self) -> bool {
        let tolerance = self.hop_seconds();
        if self.start_seconds <= tolerance {
            return true;
        }
        match self.source_duration {
            Some(duration) => {
                self.start_seconds + self.span_seconds() >= duration - self.frame_seconds()
            }
            None => false,
        }
    }

    /// True if the spectral arrays came from the zero-crossing surrogate.
    pub fn is_low_fidelity(&self) -> bool {
        self.spectral_backend == SpectralBackend::ZeroCrossing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_truncates_and_tracks_start() {
        let pcm = PcmBuffer::new(vec![0.0; 1000], 100, 2.0);
        let slice = pcm.slice(9.5, 2.0).unwrap();
        assert_eq!(slice.len(), 50);
        assert!((slice.start_seconds - 11.5).abs() < 1e-12);
        assert!(pcm.slice(10.0, 1.0).is_none());
    }

    #[test]
    fn validate_rejects_contract_violations() {
        let ok = PcmBuffer::new(vec![0.1, -0.1], 8000, 0.0);
        assert!(ok.validate(8000).is_ok());

        assert_eq!(
            ok.validate(16000),
            Err(PcmError::SampleRateMismatch {
                expected: 16000,
                actual: 8000
            })
        );

        let nan = PcmBuffer::new(vec![0.0, f64::NAN], 8000, 0.0);
        assert_eq!(nan.validate(8000), Err(PcmError::NonFinite { index: 1 }));

        let empty = PcmBuffer::new(vec![], 8000, 0.0);
        assert_eq!(empty.validate(8000), Err(PcmError::Empty));
    }

    #[test]
    fn validate_enforces_unit_range() {
        let full_scale = PcmBuffer::new(vec![1.0, -1.0, 0.0], 8000, 0.0);
        assert!(full_scale.validate(8000).is_ok());

        let hot = PcmBuffer::new(vec![0.5, -1.25, 0.2], 8000, 0.0);
        assert_eq!(
            hot.validate(8000),
            Err(PcmError::OutOfRange {
                index: 1,
                value: -1.25
            })
        );
    }

    #[test]
    fn window_snaps_to_the_sample_grid() {
        let window = AnalysisWindow::new(13.055, 11.19).snapped_to(44100);
        let samples = window.start_seconds * 44100.0;
        assert!((samples - samples.round()).abs() < 1e-6, "{samples}");
        assert!((window.start_seconds - 13.055).abs() <= 0.5 / 44100.0);
        assert_eq!(window.duration_seconds, 11.19);

        let exact = AnalysisWindow::new(10.0, 5.0);
        assert_eq!(exact.snapped_to(44100), exact);
        assert_eq!(exact.snapped_to(0), exact);
    }

    #[test]
    fn bundle_boundary_detection() {
        let mut bundle = FeatureBundle::empty(2048, 512, 44100, 0.0);
        bundle.energy = vec![0.5; 100];
        assert!(bundle.touches_source_boundary());

        bundle.start_seconds = 5.0;
        assert!(!bundle.touches_source_boundary());

        let end = 5.0 + bundle.span_seconds();
        let bundle = bundle.with_source_duration(end);
        assert!(bundle.touches_source_boundary());
    }

    #[test]
    fn silence_detection_uses_floor() {
        let mut bundle = FeatureBundle::empty(2048, 512, 44100, 0.0);
        bundle.energy = vec![0.0, 1e-6, 0.0];
        assert!(bundle.is_silent());
        bundle.energy[1] = 0.01;
        assert!(!bundle.is_silent());
    }
}
