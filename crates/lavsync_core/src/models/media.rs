//! Reference to a media source handed to the decoder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A media file plus an optional audio stream selector.
///
/// Recorders that write a -6 dB safety track put it in a second stream;
/// `stream_index` picks it (`-map 0:a:N`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub path: PathBuf,
    #[serde(default)]
    pub stream_index: Option<usize>,
}

impl MediaRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stream_index: None,
        }
    }

    /// Select a specific audio stream.
    pub fn with_stream(mut self, index: usize) -> Self {
        self.stream_index = Some(index);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stream_index {
            Some(idx) => write!(f, "{} [a:{}]", self.path.display(), idx),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

impl From<&str> for MediaRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for MediaRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}
