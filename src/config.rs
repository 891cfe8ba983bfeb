//! File configuration.
//!
//! Every section is optional; missing sections and keys fall back to the
//! values the camera firmware ships with.

use crate::camera::{CameraProfiles, ModeProfile};
use crate::capture::{CaptureSettings, DEFAULT_MAX_CONTENT_LENGTH};
use crate::stream::{DEFAULT_BYTES_PER_POLL, DEFAULT_MAX_FRAME_SIZE};
use crate::timelapse::TimelapseSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Highest quality value the camera accepts.
const MAX_QUALITY: u8 = 63;

/// Remote camera connection and mode profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Base URL of the camera API; request paths are appended to it.
    pub base_url: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Per-request timeout in milliseconds for control and capture requests.
    pub request_timeout_ms: u64,
    /// Framesize used for the live feed.
    pub preview_framesize: u8,
    /// Framesize used by timelapse sessions.
    pub timelapse_framesize: u8,
    /// Framesize used for snapshots.
    pub capture_framesize: u8,
    /// Quality used for the live feed.
    pub stream_quality: u8,
    /// Quality used for snapshots and timelapse photos.
    pub capture_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.4.1/api/v1".to_string(),
            user_agent: concat!("camfeed/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_ms: 15_000,
            preview_framesize: 6,
            timelapse_framesize: 10,
            capture_framesize: 13,
            stream_quality: 0,
            capture_quality: 2,
        }
    }
}

/// Live feed buffering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Largest frame kept, in bytes.
    pub max_frame_size: usize,
    /// Bytes consumed per control-loop pass.
    pub bytes_per_poll: usize,
    /// Wait after a failed connect before trying again.
    pub reconnect_backoff_ms: u64,
    /// Longest single wait for live feed data, in milliseconds.
    pub read_timeout_ms: u64,
    /// Live feed silence after which the feed is dropped and reopened.
    pub idle_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            bytes_per_poll: DEFAULT_BYTES_PER_POLL,
            reconnect_backoff_ms: 2_000,
            read_timeout_ms: 500,
            idle_timeout_ms: 10_000,
        }
    }
}

/// Snapshot capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Largest declared photo accepted, in bytes.
    pub max_content_length: u64,
    /// Pause around mode switches, in milliseconds.
    pub settle_delay_ms: u64,
    /// Directory snapshots are saved to.
    pub images_root: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            settle_delay_ms: 500,
            images_root: PathBuf::from("images"),
        }
    }
}

/// Timelapse sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelapseConfig {
    /// Directory holding one subdirectory per session.
    pub root: PathBuf,
    /// Time between photos, in milliseconds.
    pub interval_ms: u64,
    /// Inactivity before the screen turns off, in milliseconds.
    pub screen_off_timeout_ms: u64,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("images/timelapse"),
            interval_ms: 5_000,
            screen_off_timeout_ms: 60_000,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// `stream.max_frame_size` is zero.
    #[error("frame capacity must be non-zero")]
    InvalidFrameSize,
    /// `stream.bytes_per_poll` is zero or exceeds the frame capacity.
    #[error("bytes per poll must be between 1 and the frame capacity ({0})")]
    InvalidPollBudget(usize),
    /// A named interval or timeout is zero.
    #[error("{0} interval must be non-zero")]
    InvalidInterval(&'static str),
    /// The stream idle limit is shorter than a single read wait.
    #[error("idle timeout must be at least the read timeout ({0} ms)")]
    InvalidIdleTimeout(u64),
    /// A quality value above 63.
    #[error("quality {0} out of range (0-63)")]
    InvalidQuality(u8),
    /// `capture.max_content_length` is zero.
    #[error("content length limit must be non-zero")]
    InvalidContentLength,
    /// `camera.base_url` is blank.
    #[error("base URL must not be empty")]
    MissingBaseUrl,
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[camera]` section.
    #[serde(default)]
    pub camera: CameraConfig,
    /// `[stream]` section.
    #[serde(default)]
    pub stream: StreamConfig,
    /// `[capture]` section.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[timelapse]` section.
    #[serde(default)]
    pub timelapse: TimelapseConfig,
}

impl FileConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        for quality in [self.camera.stream_quality, self.camera.capture_quality] {
            if quality > MAX_QUALITY {
                return Err(ConfigError::InvalidQuality(quality));
            }
        }
        if self.stream.max_frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize);
        }
        if self.stream.bytes_per_poll == 0 || self.stream.bytes_per_poll > self.stream.max_frame_size {
            return Err(ConfigError::InvalidPollBudget(self.stream.max_frame_size));
        }
        if self.stream.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidInterval("stream read"));
        }
        if self.stream.idle_timeout_ms < self.stream.read_timeout_ms {
            return Err(ConfigError::InvalidIdleTimeout(self.stream.read_timeout_ms));
        }
        if self.capture.max_content_length == 0 {
            return Err(ConfigError::InvalidContentLength);
        }
        if self.timelapse.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("timelapse"));
        }
        if self.timelapse.screen_off_timeout_ms == 0 {
            return Err(ConfigError::InvalidInterval("screen-off"));
        }
        Ok(())
    }

    /// Mode profiles for the camera link.
    pub fn camera_profiles(&self) -> CameraProfiles {
        let camera = &self.camera;
        CameraProfiles {
            preview: ModeProfile {
                framesize: camera.preview_framesize,
                quality: camera.stream_quality,
            },
            capture: ModeProfile {
                framesize: camera.capture_framesize,
                quality: camera.capture_quality,
            },
            timelapse: ModeProfile {
                framesize: camera.timelapse_framesize,
                quality: camera.capture_quality,
            },
        }
    }

    /// Snapshot protocol settings.
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            max_frame_size: self.stream.max_frame_size,
            max_content_length: self.capture.max_content_length,
            settle_delay: Duration::from_millis(self.capture.settle_delay_ms),
        }
    }

    /// Timelapse scheduler settings.
    pub fn timelapse_settings(&self) -> TimelapseSettings {
        TimelapseSettings {
            root: self.timelapse.root.clone(),
            interval: Duration::from_millis(self.timelapse.interval_ms),
            screen_off_timeout: Duration::from_millis(self.timelapse.screen_off_timeout_ms),
            capture: self.capture_settings(),
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.camera.request_timeout_ms)
    }

    /// Longest single wait for live feed data.
    pub fn stream_read_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.read_timeout_ms)
    }

    /// Live feed silence tolerated before reconnecting.
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.idle_timeout_ms)
    }

    /// Wait after a failed live feed connect.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.stream.reconnect_backoff_ms)
    }
}
