//! Audio analysis pipeline.
//!
//! PCM buffers become [`FeatureBundle`]s, which are classified and handed to
//! the offset estimators in [`methods`]; [`fusion`] combines their opinions
//! into a single offset and confidence.
//!
//! # Pipeline
//!
//! 1. [`select_window`] picks the reference window; [`search_range`] widens it
//!    for the other source.
//! 2. [`FeatureExtractor`] computes energy, ZCR, spectral centroid, cepstra
//!    and onsets.
//! 3. [`classify`] labels the reference window.
//! 4. Each [`methods::SyncAlgorithm`] estimates an offset or abstains.
//! 5. [`Fusion`] weights the estimates by content label and confidence.

pub mod classifier;
pub mod correlation;
pub mod features;
pub mod fft;
pub mod fusion;
pub mod methods;
pub mod peak_fit;
pub mod types;
pub mod window;

pub use classifier::classify;
pub use features::{FeatureConfig, FeatureExtractor};
pub use fft::FftCache;
pub use fusion::{FusedEstimate, Fusion, Rejection, WeightTable};
pub use methods::{
    create_algorithm, default_algorithms, AbstainReason, AlgorithmResult, RunContext,
    SyncAlgorithm,
};
pub use types::{AnalysisWindow, FeatureBundle, PcmBuffer, PcmError, SILENT_ENERGY};
pub use window::{fits_source, search_range, select_window, WindowConfig};
