//! Synchronization entry points.
//!
//! [`SyncEngine::synchronize`] estimates the offset of one recording against
//! another and returns a [`SyncReport`]. Positive offsets mean source `b`
//! starts after source `a`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lavsync_core::decode::FfmpegDecoder;
//! use lavsync_core::{MediaRef, SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(Arc::new(FfmpegDecoder::default()));
//! let options = SyncOptions::default().with_timeout(Duration::from_secs(60));
//!
//! let camera = MediaRef::new("A001_C003.mov");
//! let lav = MediaRef::new("ZOOM0042.WAV");
//! let report = engine.synchronize(&camera, &lav, &options).unwrap();
//! if report.meets_min_confidence() {
//!     println!("shift lavalier by {} ms", -report.offset_ms());
//! }
//! ```

mod control;
mod engine;
mod options;
mod result;
mod stats;

#[cfg(test)]
mod scenarios;

pub use control::{CancelToken, Checkpoint, Interrupt};
pub use engine::SyncEngine;
pub use options::SyncOptions;
pub use result::{SyncError, SyncReport, SyncStatus, FUSED_ALGORITHM};
pub use stats::SyncStatistics;
