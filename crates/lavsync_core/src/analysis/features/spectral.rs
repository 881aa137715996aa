//! Frequency-domain frame features: power spectrum, spectral centroid and
//! mel-cepstral coefficients.
//!
//! Mel conversion uses the 1127 · ln(1 + f/700) form with Slaney-style area
//! normalization; the DCT-II uses orthonormal scaling.

use std::f64::consts::PI;

/// Floor applied before taking the log of mel energies.
const LOG_FLOOR: f64 = 1e-10;

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// One triangular filter, stored over its non-zero bins only.
#[derive(Debug, Clone)]
struct MelBand {
    first_bin: usize,
    weights: Vec<f64>,
}

/// Triangular mel filterbank over `n_fft / 2 + 1` power bins.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    bands: Vec<MelBand>,
}

impl MelFilterbank {
    pub fn new(n_mels: usize, n_fft: usize, sample_rate: u32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let sr = sample_rate as f64;
        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(sr / 2.0);

        // n_mels + 2 edge points
        let hz_points: Vec<f64> = (0..=n_mels + 1)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();
        let bin_points: Vec<f64> = hz_points.iter().map(|&hz| hz * n_fft as f64 / sr).collect();

        let bands = (0..n_mels)
            .map(|i| {
                let (start, center, end) = (bin_points[i], bin_points[i + 1], bin_points[i + 2]);
                let bandwidth = hz_points[i + 2] - hz_points[i];
                let norm = if bandwidth > 0.0 { 2.0 / bandwidth } else { 1.0 };

                let first_bin = start.ceil().max(0.0) as usize;
                let last_bin = (end.floor() as usize).min(n_bins.saturating_sub(1));
                let weights = (first_bin..=last_bin.max(first_bin))
                    .map(|j| {
                        let bin = j as f64;
                        let w = if bin >= start && bin < center {
                            (bin - start) / (center - start)
                        } else if bin >= center && bin <= end {
                            (end - bin) / (end - center)
                        } else {
                            0.0
                        };
                        w * norm
                    })
                    .collect();
                MelBand { first_bin, weights }
            })
            .collect();

        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Log mel energies of a power spectrum.
    pub fn log_energies(&self, power: &[f64]) -> Vec<f64> {
        self.bands
            .iter()
            .map(|band| {
                let sum: f64 = band
                    .weights
                    .iter()
                    .enumerate()
                    .filter_map(|(offset, &w)| power.get(band.first_bin + offset).map(|p| p * w))
                    .sum();
                sum.max(LOG_FLOOR).ln()
            })
            .collect()
    }
}

/// Orthonormal DCT-II, truncated to the first `n_coeffs` outputs.
#[derive(Debug, Clone)]
pub struct Dct {
    basis: Vec<Vec<f64>>,
}

impl Dct {
    pub fn new(n_inputs: usize, n_coeffs: usize) -> Self {
        let n = n_inputs as f64;
        let basis = (0..n_coeffs)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..n_inputs)
                    .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                    .collect()
            })
            .collect();
        Self { basis }
    }

    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        self.basis
            .iter()
            .map(|row| row.iter().zip(input.iter()).map(|(b, x)| b * x).sum())
            .collect()
    }
}

/// Spectral centroid in Hz of a one-sided power spectrum.
///
/// Returns 0 for a spectrum with no energy.
pub fn spectral_centroid(power: &[f64], sample_rate: u32, n_fft: usize) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 1e-20 || n_fft == 0 {
        return 0.0;
    }
    let weighted: f64 = power.iter().enumerate().map(|(i, p)| i as f64 * p).sum();
    weighted / total * sample_rate as f64 / n_fft as f64
}

/// Zero-crossing stand-in for the centroid: a crossing rate `z` per sample
/// corresponds to a dominant frequency of `z · sr / 2`.
pub fn zcr_centroid(zcr: f64, sample_rate: u32) -> f64 {
    zcr * sample_rate as f64 / 2.0
}

/// Two-coefficient cepstral stand-in used when no FFT is run.
pub fn surrogate_cepstrum(energy: f64, centroid_hz: f64) -> Vec<f64> {
    vec![(energy * energy).max(LOG_FLOOR).ln(), centroid_hz / 1000.0]
}
