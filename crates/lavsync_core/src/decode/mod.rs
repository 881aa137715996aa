//! Decoder contract.
//!
//! The core never reads containers itself. A [`Decoder`] turns a
//! [`MediaRef`] plus a time range into mono PCM at exactly the requested
//! sample rate, with `samples[i]` at `start + i / sample_rate`.

mod ffmpeg;
mod memory;

pub use ffmpeg::FfmpegDecoder;
pub use memory::MemoryDecoder;

use thiserror::Error;

use crate::analysis::PcmBuffer;
use crate::models::MediaRef;

/// Errors reported by a decoder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Requested range out of bounds: {0}")]
    OutOfRange(String),

    #[error("Decode cancelled")]
    Cancelled,

    #[error("Decoder failure: {0}")]
    Internal(String),
}

impl DecodeError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        DecodeError::NotFound(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        DecodeError::UnsupportedFormat(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        DecodeError::OutOfRange(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DecodeError::Internal(msg.into())
    }
}

/// Result type for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Time range and format requested from a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeRequest {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    /// Output channel count; the core always asks for 1.
    pub channels: u16,
}

impl DecodeRequest {
    /// Mono request for `[start, start + duration)`.
    pub fn mono(start_seconds: f64, duration_seconds: f64, sample_rate: u32) -> Self {
        Self {
            start_seconds,
            duration_seconds,
            sample_rate,
            channels: 1,
        }
    }
}

/// Source of PCM for the analysis core.
///
/// Implementations must be callable from several threads at once.
pub trait Decoder: Send + Sync {
    /// Decode a time range to PCM.
    fn decode(&self, media: &MediaRef, request: &DecodeRequest) -> DecodeResult<PcmBuffer>;

    /// Total duration of the source, in seconds.
    fn duration(&self, media: &MediaRef) -> DecodeResult<f64>;
}
