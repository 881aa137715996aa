//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{SpectralBackend, SyncQuality};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Window selection and search limits.
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Framing and feature parameters.
    #[serde(default)]
    pub features: FeatureSettings,

    /// External decoder tools.
    #[serde(default)]
    pub decoder: DecoderSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Sample rate requested from the decoder, in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default)]
    pub quality: SyncQuality,

    /// Largest offset, in seconds, that can be reported.
    #[serde(default = "default_max_offset")]
    pub max_offset_seconds: f64,

    /// Advisory acceptance threshold attached to each report.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_min_window")]
    pub min_window_seconds: f64,

    #[serde(default = "default_max_window")]
    pub max_window_seconds: f64,

    /// Share of the shorter source used for analysis.
    #[serde(default = "default_window_fraction")]
    pub window_fraction: f64,

    /// Windows shorter than this always abstain.
    #[serde(default = "default_min_usable")]
    pub min_usable_seconds: f64,

    /// Run the estimators on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_max_offset() -> f64 {
    30.0
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_min_window() -> f64 {
    10.0
}

fn default_max_window() -> f64 {
    30.0
}

fn default_window_fraction() -> f64 {
    0.3
}

fn default_min_usable() -> f64 {
    2.0
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            quality: SyncQuality::default(),
            max_offset_seconds: default_max_offset(),
            min_confidence: default_min_confidence(),
            min_window_seconds: default_min_window(),
            max_window_seconds: default_max_window(),
            window_fraction: default_window_fraction(),
            min_usable_seconds: default_min_usable(),
            parallel: false,
        }
    }
}

/// Feature extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Samples per frame.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Samples between frames.
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,

    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,

    #[serde(default = "default_n_mels")]
    pub n_mels: usize,

    /// Minimum spacing between detected onsets, in milliseconds.
    #[serde(default = "default_min_onset_gap")]
    pub min_onset_gap_ms: u32,

    #[serde(default)]
    pub spectral_backend: SpectralBackend,
}

fn default_frame_size() -> usize {
    2048
}

fn default_hop_size() -> usize {
    512
}

fn default_n_mfcc() -> usize {
    13
}

fn default_n_mels() -> usize {
    40
}

fn default_min_onset_gap() -> u32 {
    250
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            hop_size: default_hop_size(),
            n_mfcc: default_n_mfcc(),
            n_mels: default_n_mels(),
            min_onset_gap_ms: default_min_onset_gap(),
            spectral_backend: SpectralBackend::default(),
        }
    }
}

/// Decoder tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    /// Resample with the SoX resampler for better quality.
    #[serde(default)]
    pub use_soxr: bool,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            use_soxr: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Analysis,
    Features,
    Decoder,
    Logging,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Analysis,
        ConfigSection::Features,
        ConfigSection::Decoder,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Analysis => "analysis",
            ConfigSection::Features => "features",
            ConfigSection::Decoder => "decoder",
            ConfigSection::Logging => "logging",
        }
    }
}
