//! In-memory decoder for callers that already hold PCM.

use std::collections::HashMap;

use crate::analysis::PcmBuffer;
use crate::models::MediaRef;

use super::{DecodeError, DecodeRequest, DecodeResult, Decoder};

#[derive(Debug, Clone)]
struct MemorySource {
    samples: Vec<f64>,
    sample_rate: u32,
}

/// Serves registered mono sources by time range. Never resamples.
#[derive(Debug, Clone, Default)]
pub struct MemoryDecoder {
    sources: HashMap<MediaRef, MemorySource>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a source.
    pub fn insert(&mut self, media: impl Into<MediaRef>, samples: Vec<f64>, sample_rate: u32) {
        self.sources.insert(
            media.into(),
            MemorySource {
                samples,
                sample_rate,
            },
        );
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_source(
        mut self,
        media: impl Into<MediaRef>,
        samples: Vec<f64>,
        sample_rate: u32,
    ) -> Self {
        self.insert(media, samples, sample_rate);
        self
    }

    fn source(&self, media: &MediaRef) -> DecodeResult<&MemorySource> {
        self.sources
            .get(media)
            .ok_or_else(|| DecodeError::not_found(media.to_string()))
    }
}

impl Decoder for MemoryDecoder {
    fn decode(&self, media: &MediaRef, request: &DecodeRequest) -> DecodeResult<PcmBuffer> {
        let source = self.source(media)?;
        if request.channels != 1 {
            return Err(DecodeError::unsupported(format!(
                "{} channels requested; only mono is stored",
                request.channels
            )));
        }
        if source.sample_rate != request.sample_rate {
            return Err(DecodeError::unsupported(format!(
                "{} is stored at {} Hz, {} Hz requested",
                media, source.sample_rate, request.sample_rate
            )));
        }

        let sr = source.sample_rate as f64;
        let total = source.samples.len();
        let bad_start = request.start_seconds.is_nan() || request.start_seconds < 0.0;
        if bad_start || request.duration_seconds <= 0.0 {
            return Err(DecodeError::out_of_range(format!(
                "start {:.3}s, duration {:.3}s",
                request.start_seconds, request.duration_seconds
            )));
        }

        let start = (request.start_seconds * sr).round() as usize;
        if start >= total {
            return Err(DecodeError::out_of_range(format!(
                "start {:.3}s past end of {} ({:.3}s)",
                request.start_seconds,
                media,
                total as f64 / sr
            )));
        }
        let end = (start + (request.duration_seconds * sr).round() as usize).min(total);

        Ok(PcmBuffer::new(
            source.samples[start..end].to_vec(),
            source.sample_rate,
            start as f64 / sr,
        ))
    }

    fn duration(&self, media: &MediaRef) -> DecodeResult<f64> {
        let source = self.source(media)?;
        if source.sample_rate == 0 {
            return Err(DecodeError::unsupported(format!("{} has no sample rate", media)));
        }
        Ok(source.samples.len() as f64 / source.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> MemoryDecoder {
        let samples: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        MemoryDecoder::new()
            .with_source("a.wav", samples, 100)
            .with_source(MediaRef::new("a.wav").with_stream(1), vec![0.5; 200], 100)
    }

    #[test]
    fn decodes_time_range() {
        let pcm = decoder()
            .decode(&"a.wav".into(), &DecodeRequest::mono(2.0, 1.5, 100))
            .unwrap();
        assert_eq!(pcm.len(), 150);
        assert_eq!(pcm.start_seconds, 2.0);
        assert!((pcm.samples[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn truncates_at_end_and_reports_duration() {
        let dec = decoder();
        let pcm = dec
            .decode(&"a.wav".into(), &DecodeRequest::mono(9.0, 5.0, 100))
            .unwrap();
        assert_eq!(pcm.len(), 100);
        assert_eq!(dec.duration(&"a.wav".into()).unwrap(), 10.0);
    }

    #[test]
    fn streams_are_separate_sources() {
        let dec = decoder();
        let media = MediaRef::new("a.wav").with_stream(1);
        assert_eq!(dec.duration(&media).unwrap(), 2.0);
        assert!(matches!(
            dec.duration(&MediaRef::new("a.wav").with_stream(2)),
            Err(DecodeError::NotFound(_))
        ));
    }

    #[test]
    fn contract_violations_are_errors() {
        let dec = decoder();
        let media: MediaRef = "a.wav".into();
        assert!(matches!(
            dec.decode(&media, &DecodeRequest::mono(0.0, 1.0, 44100)),
            Err(DecodeError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            dec.decode(&media, &DecodeRequest::mono(10.0, 1.0, 100)),
            Err(DecodeError::OutOfRange(_))
        ));
        assert!(matches!(
            dec.decode(&media, &DecodeRequest::mono(-1.0, 1.0, 100)),
            Err(DecodeError::OutOfRange(_))
        ));
        assert!(matches!(
            dec.decode(&"missing.wav".into(), &DecodeRequest::mono(0.0, 1.0, 100)),
            Err(DecodeError::NotFound(_))
        ));
    }
}
