//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//!
//! # Example
//!
//! ```no_run
//! use lavsync_core::config::{ConfigManager, ConfigSection};
//! use lavsync_core::SyncQuality;
//!
//! let mut config = ConfigManager::new(".config/lavsync.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().analysis.quality = SyncQuality::HighQuality;
//! config.update_section(ConfigSection::Analysis).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AnalysisSettings, ConfigSection, DecoderSettings, FeatureSettings, LoggingSettings, Settings,
};
