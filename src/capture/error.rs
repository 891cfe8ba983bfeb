//! Capture failure taxonomy.

use crate::camera::{LinkError, ModeSwitchError};
use crate::storage::StorageError;
use thiserror::Error;

/// The camera answered, but not with a usable photo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The response was not `image/jpeg`.
    #[error("unexpected content type {0:?}")]
    UnexpectedContentType(String),
    /// `Content-Length` is above the accepted limit.
    #[error("declared content length {declared} exceeds limit {limit}")]
    ContentTooLarge {
        /// Length the camera declared.
        declared: u64,
        /// Largest length accepted.
        limit: u64,
    },
    /// The body ended before the declared length.
    #[error("body truncated after {received} bytes")]
    Truncated {
        /// Bytes read before the body ended.
        received: u64,
    },
    /// The body holds no SOI..EOI frame.
    #[error("no complete JPEG frame in body")]
    NoFrame,
}

/// Why a snapshot or timelapse capture failed.
///
/// None of these are fatal; the caller logs and carries on.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A request could not be completed.
    #[error("network: {0}")]
    Network(#[from] LinkError),
    /// The camera refused the mode change.
    #[error("mode switch: {0}")]
    ModeSwitch(#[from] ModeSwitchError),
    /// The camera answered with something other than a photo.
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    /// The photo could not be saved.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl CaptureError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Network(_) => "network",
            CaptureError::ModeSwitch(_) => "mode_switch",
            CaptureError::Protocol(_) => "protocol",
            CaptureError::Storage(_) => "storage",
        }
    }
}
