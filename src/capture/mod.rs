//! Still photo capture.
//!
//! Both capture paths share the same request sequence against the camera:
//! a trigger GET whose response is discarded, then an authoritative GET
//! that is validated before any body byte is read. A snapshot keeps the
//! photo in memory ([`SnapshotCapture`]); the timelapse scheduler streams
//! it straight to storage.

mod error;
pub(crate) mod fetch;
mod snapshot;

pub use error::{CaptureError, ProtocolError};
pub use snapshot::{persist_snapshot, snapshot_file_name, CaptureResult, SnapshotCapture};

use crate::stream::DEFAULT_MAX_FRAME_SIZE;
use std::time::Duration;

/// Default ceiling on a declared photo length.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 5 * 1024 * 1024;

/// Default pause around mode switches and between the two capture GETs.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Limits and timing for the capture protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Capacity of the in-memory photo buffer.
    pub max_frame_size: usize,
    /// Largest declared body accepted, and the most bytes a timelapse
    /// photo may write.
    pub max_content_length: u64,
    /// Pause given to the camera after stopping the feed and between
    /// the trigger and fetch requests.
    pub settle_delay: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}
