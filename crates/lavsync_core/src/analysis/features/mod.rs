//! Feature extraction.
//!
//! Converts a PCM buffer into a [`FeatureBundle`]: energy envelope,
//! zero-crossing rate, spectral centroid, mel-cepstral coefficients and
//! onset indices. Frame `k` covers samples `[k·H, k·H + N)`; partial frames
//! at the end are dropped. Buffers with fewer than two frames yield an
//! empty bundle.

mod onset;
mod spectral;
mod temporal;

pub use onset::{OnsetDetector, RollingStatistics};
pub use spectral::{hann_window, spectral_centroid, Dct, MelFilterbank};
pub use temporal::{frame_energy, zero_crossing_rate};

use std::sync::Arc;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::analysis::fft::FftCache;
use crate::analysis::types::{FeatureBundle, PcmBuffer};
use crate::config::FeatureSettings;
use crate::models::SpectralBackend;
use crate::sync::{Checkpoint, Interrupt};

/// Frames processed between checkpoint polls.
const FRAMES_PER_CHECK: usize = 256;

/// Framing and feature parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Samples per analysis frame (also the FFT length).
    pub frame_size: usize,
    /// Samples between frame starts.
    pub hop_size: usize,
    /// Cepstral coefficients kept per frame.
    pub n_mfcc: usize,
    /// Mel bands feeding the cepstrum.
    pub n_mels: usize,
    /// Minimum spacing between onsets, in seconds.
    pub min_onset_gap_seconds: f64,
    pub backend: SpectralBackend,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            n_mfcc: 13,
            n_mels: 40,
            min_onset_gap_seconds: 0.25,
            backend: SpectralBackend::Fft,
        }
    }
}

impl FeatureConfig {
    pub fn from_settings(settings: &FeatureSettings) -> Self {
        Self {
            frame_size: settings.frame_size.max(2),
            hop_size: settings.hop_size.max(1),
            n_mfcc: settings.n_mfcc,
            n_mels: settings.n_mels.max(1),
            min_onset_gap_seconds: settings.min_onset_gap_ms as f64 / 1000.0,
            backend: settings.spectral_backend,
        }
    }

    /// Number of complete frames in `n_samples`, or 0 when below two.
    pub fn frame_count(&self, n_samples: usize) -> usize {
        if self.hop_size == 0 || n_samples < self.frame_size {
            return 0;
        }
        let count = (n_samples - self.frame_size) / self.hop_size + 1;
        if count < 2 {
            0
        } else {
            count
        }
    }
}

/// Turns PCM buffers into feature bundles.
///
/// Holds only immutable tables; one extractor can serve many calls.
#[derive(Debug)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    fft: Arc<FftCache>,
    window: Vec<f64>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, fft: Arc<FftCache>) -> Self {
        let window = hann_window(config.frame_size);
        Self {
            config,
            fft,
            window,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract every feature array from `pcm`.
    ///
    /// Polls `checkpoint` every few hundred frames.
    pub fn extract(
        &self,
        pcm: &PcmBuffer,
        checkpoint: &Checkpoint,
    ) -> Result<FeatureBundle, Interrupt> {
        let cfg = &self.config;
        let mut bundle =
            FeatureBundle::empty(cfg.frame_size, cfg.hop_size, pcm.sample_rate, pcm.start_seconds);
        bundle.spectral_backend = cfg.backend;

        let frames = cfg.frame_count(pcm.len());
        if frames == 0 || pcm.sample_rate == 0 {
            tracing::debug!(
                "Buffer of {} samples too short for {}-sample frames",
                pcm.len(),
                cfg.frame_size
            );
            return Ok(bundle);
        }

        bundle.energy.reserve(frames);
        bundle.zcr.reserve(frames);
        bundle.spectral_centroid.reserve(frames);
        bundle.mfcc.reserve(frames);

        let spectral = match cfg.backend {
            SpectralBackend::Fft => Some(SpectralFrames::new(self, pcm.sample_rate)),
            SpectralBackend::ZeroCrossing => None,
        };

        for k in 0..frames {
            if k % FRAMES_PER_CHECK == 0 {
                checkpoint.check()?;
            }

            let start = k * cfg.hop_size;
            let frame = &pcm.samples[start..start + cfg.frame_size];

            let energy = frame_energy(frame);
            let zcr = zero_crossing_rate(frame);

            let (centroid, cepstrum) = match &spectral {
                Some(sf) => sf.analyze(frame),
                None => {
                    let centroid = spectral::zcr_centroid(zcr, pcm.sample_rate);
                    (centroid, spectral::surrogate_cepstrum(energy, centroid))
                }
            };

            bundle.energy.push(energy);
            bundle.zcr.push(zcr);
            bundle.spectral_centroid.push(centroid);
            bundle.mfcc.push(cepstrum);
        }

        let detector =
            OnsetDetector::new(cfg.min_onset_gap_seconds, cfg.hop_size, pcm.sample_rate);
        bundle.onsets = detector.detect(&bundle.energy);

        tracing::debug!(
            "Extracted {} frames ({} onsets) starting at {:.3}s",
            bundle.frame_count(),
            bundle.onsets.len(),
            bundle.start_seconds
        );

        Ok(bundle)
    }
}

/// Per-call spectral state: FFT plan, filterbank and scratch space.
struct SpectralFrames<'a> {
    extractor: &'a FeatureExtractor,
    sample_rate: u32,
    fft: Arc<dyn rustfft::Fft<f64>>,
    filterbank: MelFilterbank,
    dct: Dct,
}

impl<'a> SpectralFrames<'a> {
    fn new(extractor: &'a FeatureExtractor, sample_rate: u32) -> Self {
        let cfg = &extractor.config;
        Self {
            extractor,
            sample_rate,
            fft: extractor.fft.forward(cfg.frame_size),
            filterbank: MelFilterbank::new(cfg.n_mels, cfg.frame_size, sample_rate),
            dct: Dct::new(cfg.n_mels, cfg.n_mfcc.min(cfg.n_mels)),
        }
    }

    /// Centroid (Hz) and cepstrum of one frame.
    fn analyze(&self, frame: &[f64]) -> (f64, Vec<f64>) {
        let n_fft = self.extractor.config.frame_size;
        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .zip(self.extractor.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let power: Vec<f64> = buffer[..n_fft / 2 + 1].iter().map(|c| c.norm_sqr()).collect();

        let centroid = spectral_centroid(&power, self.sample_rate, n_fft);
        let cepstrum = self.dct.apply(&self.filterbank.log_energies(&power));
        (centroid, cepstrum)
    }
}
