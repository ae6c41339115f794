//! Error types shared by the room and timeline view-models.

use thiserror::Error;

/// An error reported by the messaging SDK behind a [`RoomHandle`](crate::room::RoomHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SdkError {
    /// The HTTP status code of the failed request, if the failure came from the homeserver.
    pub status: Option<u16>,
    pub message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }
}

/// Failures that can happen while preparing or sending an attachment.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("this platform does not support videos of type {0}.")]
    UnsupportedVideo(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unknown image format")]
    UnknownImageFormat,
    #[error("failed to build attachment content: {0}")]
    Content(#[from] serde_json::Error),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Failures while loading a [`RoomViewConfig`](crate::config::RoomViewConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
