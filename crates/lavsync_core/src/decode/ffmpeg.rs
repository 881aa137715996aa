//! FFmpeg-backed decoder.
//!
//! Seeks to the requested start, downmixes to mono, resamples to the
//! requested rate and streams raw f64 samples over a pipe. Durations come
//! from ffprobe's JSON output.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use serde::Deserialize;

use crate::analysis::PcmBuffer;
use crate::config::DecoderSettings;
use crate::models::MediaRef;

use super::{DecodeError, DecodeRequest, DecodeResult, Decoder};

/// Shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    use_soxr: bool,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::from_settings(&DecoderSettings::default())
    }
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            use_soxr: false,
        }
    }

    pub fn from_settings(settings: &DecoderSettings) -> Self {
        Self::new(&settings.ffmpeg_path, &settings.ffprobe_path).with_soxr(settings.use_soxr)
    }

    /// Use the SoX resampler.
    pub fn with_soxr(mut self, enabled: bool) -> Self {
        self.use_soxr = enabled;
        self
    }

    /// FFmpeg arguments for one decode request.
    fn build_args(&self, media: &MediaRef, request: &DecodeRequest) -> Vec<String> {
        let mut args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.6}", seek_seconds(request.start_seconds)),
            "-i".to_string(),
            media.path.display().to_string(),
        ];

        if let Some(idx) = media.stream_index {
            args.push("-map".to_string());
            args.push(format!("0:a:{}", idx));
        }

        args.extend([
            "-t".to_string(),
            format!("{:.3}", request.duration_seconds),
            "-vn".to_string(),
            "-ac".to_string(),
            request.channels.to_string(),
            "-ar".to_string(),
            request.sample_rate.to_string(),
        ]);

        if self.use_soxr {
            args.push("-resampler".to_string());
            args.push("soxr".to_string());
        }

        args.extend(
            ["-f", "f64le", "-acodec", "pcm_f64le", "pipe:1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    fn check_exists(media: &MediaRef) -> DecodeResult<()> {
        if media.path.exists() {
            Ok(())
        } else {
            Err(DecodeError::not_found(media.path.display().to_string()))
        }
    }
}

impl Decoder for FfmpegDecoder {
    fn decode(&self, media: &MediaRef, request: &DecodeRequest) -> DecodeResult<PcmBuffer> {
        Self::check_exists(media)?;

        let args = self.build_args(media, request);
        tracing::debug!("Running {} {}", self.ffmpeg_path.display(), args.join(" "));

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DecodeError::internal(format!("Failed to spawn FFmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(classify_failure("FFmpeg", &output));
        }

        let samples = bytes_to_f64_samples(&output.stdout);
        if samples.is_empty() {
            return Err(DecodeError::out_of_range(format!(
                "no samples at {:.3}s in {}",
                request.start_seconds, media
            )));
        }

        tracing::debug!(
            "Decoded {} samples ({:.2}s) from {}",
            samples.len(),
            samples.len() as f64 / request.sample_rate as f64,
            media
        );

        Ok(PcmBuffer::new(
            samples,
            request.sample_rate,
            seek_seconds(request.start_seconds),
        ))
    }

    fn duration(&self, media: &MediaRef) -> DecodeResult<f64> {
        Self::check_exists(media)?;

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(&media.path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DecodeError::internal(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(classify_failure("ffprobe", &output));
        }

        parse_probe_duration(&output.stdout)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Extract `format.duration` from ffprobe's JSON output.
fn parse_probe_duration(json: &[u8]) -> DecodeResult<f64> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| DecodeError::internal(format!("Failed to parse ffprobe output: {}", e)))?;

    let raw = probe
        .format
        .duration
        .ok_or_else(|| DecodeError::unsupported("container reports no duration"))?;

    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|e| DecodeError::internal(format!("Failed to parse duration '{}': {}", raw, e)))?;

    if duration.is_finite() && duration > 0.0 {
        Ok(duration)
    } else {
        Err(DecodeError::unsupported(format!("invalid duration {}", duration)))
    }
}

/// Map a failed tool invocation to a decode error using its stderr.
fn classify_failure(tool: &str, output: &Output) -> DecodeError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr.lines().last().unwrap_or("").trim().to_string();

    let unsupported = ["Invalid data", "does not contain any stream", "matches no streams"];
    if unsupported.iter().any(|needle| stderr.contains(needle)) {
        return DecodeError::unsupported(message);
    }

    DecodeError::internal(format!(
        "{} exited with code {:?}: {}",
        tool,
        output.status.code(),
        message
    ))
}

/// Seek position passed to `-ss`, rounded to the microsecond. The decoded
/// buffer reports this same start.
fn seek_seconds(start: f64) -> f64 {
    (start * 1e6).round() / 1e6
}

/// Convert raw bytes to f64 samples (little-endian). A partial trailing
/// sample is dropped.
fn bytes_to_f64_samples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            f64::from_le_bytes(arr)
        })
        .collect()
}
