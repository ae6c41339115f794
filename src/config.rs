//! Tunable limits and constants used by the tile pipeline and the room view-model.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

const MIB: u64 = 1024 * 1024;

/// Configuration for a room view-model and all tiles it creates.
///
/// Every field has a default, so a config file only needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomViewConfig {
    /// Two messages from the same sender closer together than this are rendered
    /// as a continuation (no repeated avatar and sender name).
    pub continuation_window_ms: u64,
    /// Reaction keys starting with this prefix mark the root of a thread.
    pub thread_anchor_prefix: String,
    /// Delay after opening/focusing a room before its unread count is cleared.
    pub clear_unread_delay_ms: u64,
    /// Largest file or video that may be uploaded.
    pub attachment_max_bytes: u64,
    /// Images larger than this are scaled down before uploading.
    pub image_compress_threshold_bytes: u64,
    /// Images whose largest side exceeds this get a separate thumbnail.
    pub image_thumbnail_threshold: u32,
    pub image_thumbnail_dimension: u32,
    pub video_thumbnail_dimension: u32,
    /// Overrides the maximum video thumbnail dimension when set.
    pub sent_image_size_limit: Option<u32>,
}

impl Default for RoomViewConfig {
    fn default() -> Self {
        Self {
            continuation_window_ms: 5 * 60 * 1000,
            thread_anchor_prefix: "thrd".to_owned(),
            clear_unread_delay_ms: 100,
            attachment_max_bytes: 50 * MIB,
            image_compress_threshold_bytes: MIB,
            image_thumbnail_threshold: 600,
            image_thumbnail_dimension: 400,
            video_thumbnail_dimension: 800,
            sent_image_size_limit: None,
        }
    }
}

impl RoomViewConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn clear_unread_delay(&self) -> Duration {
        Duration::from_millis(self.clear_unread_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RoomViewConfig = serde_json::from_str(r#"{ "thread_anchor_prefix": "thread:" }"#).unwrap();
        assert_eq!(config.thread_anchor_prefix, "thread:");
        assert_eq!(config.continuation_window_ms, 300_000);
        assert_eq!(config.attachment_max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.sent_image_size_limit, None);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RoomViewConfig::load("/nonexistent/roomview.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
