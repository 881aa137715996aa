//! lavsync core - audio synchronization for lavalier recordings
//!
//! Estimates the time offset between an externally recorded lavalier track
//! and the in-camera audio of a clip, together with a confidence value that
//! callers use for accept/reject decisions.
//!
//! The crate holds no state between calls. Decoding is delegated to a
//! [`decode::Decoder`] implementation; muxing is left to the caller, which
//! consumes only the offset and confidence of a [`sync::SyncReport`].

pub mod analysis;
pub mod config;
pub mod decode;
pub mod logging;
pub mod models;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_signals;

pub use decode::{DecodeError, Decoder, FfmpegDecoder, MemoryDecoder};
pub use models::{AlgorithmKind, ContentLabel, MediaRef, SyncQuality};
pub use sync::{CancelToken, SyncEngine, SyncError, SyncOptions, SyncReport, SyncStatus};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
