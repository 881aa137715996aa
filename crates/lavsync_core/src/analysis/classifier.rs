//! Rule-ladder content classification.
//!
//! The thresholds are tuning parameters chosen for RMS energies in [0, 1] and
//! zero-crossing rates normalized by frame length.

use crate::analysis::types::FeatureBundle;
use crate::models::ContentLabel;

/// Mean energy below which a window counts as silence.
pub const SILENCE_MEAN_ENERGY: f64 = 0.01;
/// Peak energy below which a window counts as silence.
pub const SILENCE_MAX_ENERGY: f64 = 0.05;
/// Mean ZCR above which a window counts as noise.
pub const NOISE_MIN_ZCR: f64 = 0.4;
/// Mean ZCR band typical for speech.
pub const SPEECH_ZCR: (f64, f64) = (0.1, 0.3);
/// Speech windows have fewer onsets than this.
pub const SPEECH_MAX_ONSETS: usize = 20;
/// Music windows have a mean ZCR below this.
pub const MUSIC_MAX_ZCR: f64 = 0.15;
/// Music windows have more onsets than this.
pub const MUSIC_MIN_ONSETS: usize = 15;

/// Label a feature bundle. Deterministic in the bundle contents.
pub fn classify(features: &FeatureBundle) -> ContentLabel {
    if features.is_empty() || features.zcr.is_empty() {
        return ContentLabel::Unknown;
    }

    let mean_energy = mean(&features.energy);
    let max_energy = features.energy.iter().copied().fold(0.0, f64::max);
    let mean_zcr = mean(&features.zcr);
    let onsets = features.onsets.len();

    let label = if mean_energy < SILENCE_MEAN_ENERGY && max_energy < SILENCE_MAX_ENERGY {
        ContentLabel::Silence
    } else if mean_zcr > NOISE_MIN_ZCR {
        ContentLabel::Noise
    } else if (SPEECH_ZCR.0..=SPEECH_ZCR.1).contains(&mean_zcr) && onsets < SPEECH_MAX_ONSETS {
        ContentLabel::Speech
    } else if mean_zcr < MUSIC_MAX_ZCR && onsets > MUSIC_MIN_ONSETS {
        ContentLabel::Music
    } else {
        ContentLabel::Mixed
    };

    tracing::debug!(
        "Classified {} frames as {} (energy {:.4}/{:.4}, zcr {:.3}, {} onsets)",
        features.frame_count(),
        label,
        mean_energy,
        max_energy,
        mean_zcr,
        onsets
    );

    label
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(energy: f64, zcr: f64, onsets: usize) -> FeatureBundle {
        let mut b = FeatureBundle::empty(2048, 512, 44100, 0.0);
        b.energy = vec![energy; 1000];
        b.zcr = vec![zcr; 1000];
        b.spectral_centroid = vec![1000.0; 1000];
        b.mfcc = vec![vec![0.0; 13]; 1000];
        b.onsets = (0..onsets).map(|i| i * 30).collect();
        b
    }

    #[test]
    fn empty_bundle_is_unknown() {
        let b = FeatureBundle::empty(2048, 512, 44100, 0.0);
        assert_eq!(classify(&b), ContentLabel::Unknown);
    }

    #[test]
    fn ladder_order() {
        assert_eq!(classify(&bundle(0.001, 0.5, 0)), ContentLabel::Silence);
        assert_eq!(classify(&bundle(0.2, 0.5, 0)), ContentLabel::Noise);
        assert_eq!(classify(&bundle(0.2, 0.2, 10)), ContentLabel::Speech);
        assert_eq!(classify(&bundle(0.2, 0.05, 25)), ContentLabel::Music);
        assert_eq!(classify(&bundle(0.2, 0.12, 25)), ContentLabel::Music);
        assert_eq!(classify(&bundle(0.2, 0.2, 25)), ContentLabel::Mixed);
        assert_eq!(classify(&bundle(0.2, 0.05, 5)), ContentLabel::Mixed);
    }

    #[test]
    fn loud_peak_breaks_silence() {
        let mut b = bundle(0.001, 0.0, 0);
        b.energy[10] = 0.2;
        assert_ne!(classify(&b), ContentLabel::Silence);
    }

    #[test]
    fn white_noise_classifies_as_noise() {
        use crate::analysis::features::{FeatureConfig, FeatureExtractor};
        use crate::analysis::{FftCache, PcmBuffer};
        use crate::sync::Checkpoint;
        use std::sync::Arc;

        let pcm = PcmBuffer::new(crate::test_signals::noise(2.0, 44100, 0.5, 11), 44100, 0.0);
        let extractor = FeatureExtractor::new(FeatureConfig::default(), Arc::new(FftCache::new()));
        let features = extractor.extract(&pcm, &Checkpoint::unbounded()).unwrap();
        assert_eq!(classify(&features), ContentLabel::Noise);

        let silent = PcmBuffer::new(vec![0.0; 88200], 44100, 0.0);
        let features = extractor.extract(&silent, &Checkpoint::unbounded()).unwrap();
        assert_eq!(classify(&features), ContentLabel::Silence);
    }
}
