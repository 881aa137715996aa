//! Shared domain models: enums and media references.

mod enums;
mod media;

pub use enums::{AlgorithmKind, ConfidenceBand, ContentLabel, SpectralBackend, SyncQuality};
pub use media::MediaRef;
