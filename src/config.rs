//! Configuration for replay streams
//!
//! Loaded from JSON bytes handed over by the embedding decoder. Every field
//! has a default, so `{}` is a valid configuration.

use serde::Deserialize;
use thiserror::Error;

/// What `unread` does when the pending replay count would exceed the
/// back buffer size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Accept the unread and emit a warning diagnostic. Replayed bytes past
    /// the back buffer are stale.
    #[default]
    Warn,
    /// Refuse the unread with `StreamError::UnreadOverflow`.
    Reject,
}

/// Replay stream configuration
#[derive(Clone, Debug, Deserialize)]
pub struct ReplayConfig {
    /// Bytes of history kept for unread
    #[serde(default = "default_back_buffer_size")]
    pub back_buffer_size: usize,

    /// Handling of unreads past the back buffer
    #[serde(default)]
    pub unread_overflow: OverflowPolicy,

    /// Trace every replay batch (for debugging)
    #[serde(default)]
    pub log_replays: bool,
}

fn default_back_buffer_size() -> usize {
    4 * 1024 // 4KB
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            back_buffer_size: default_back_buffer_size(),
            unread_overflow: OverflowPolicy::default(),
            log_replays: false,
        }
    }
}

impl ReplayConfig {
    /// Parse configuration from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str =
            std::str::from_utf8(bytes).map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.back_buffer_size == 0 {
            return Err(ConfigError::ZeroBackBuffer);
        }
        Ok(())
    }
}

/// Configuration parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("back_buffer_size must be at least 1")]
    ZeroBackBuffer,
}
