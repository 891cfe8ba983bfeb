//! One-shot high resolution photo capture.

use super::error::{CaptureError, ProtocolError};
use super::fetch::{fetch_photo, read_bounded, settle};
use super::CaptureSettings;
use crate::camera::{CameraLink, CameraMode, CameraTransport};
use crate::jpeg::{parse_frame_size, trim_to_eoi, FrameSize};
use crate::storage::{ensure_directory, write_file, Storage, StorageError};
use crate::stream::FixedBuffer;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// The most recent photo, trimmed to a single JPEG frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    bytes: Vec<u8>,
    size: Option<FrameSize>,
}

impl CaptureResult {
    /// Encoded JPEG bytes, `SOI` through `EOI`.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Dimensions read from the frame header, if present.
    pub fn size(&self) -> Option<FrameSize> {
        self.size
    }

    /// Length of the encoded photo.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a stored result.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// File name for a snapshot taken at `taken_at`.
pub fn snapshot_file_name(taken_at: &NaiveDateTime) -> String {
    taken_at.format("IMG_%Y%m%d_%H%M%S.jpg").to_string()
}

/// Runs the snapshot protocol and keeps the last good photo.
///
/// The protocol stops the live feed, switches the camera to capture mode,
/// fetches the photo twice (the first response is stale) and restores
/// preview mode. A failure before the restore leaves the camera in capture
/// mode; [`crate::camera::CameraModeState::restore_pending`] reports it.
#[derive(Debug)]
pub struct SnapshotCapture {
    settings: CaptureSettings,
    buffer: FixedBuffer,
    result: Option<CaptureResult>,
    successes: u64,
    failures: u64,
}

impl SnapshotCapture {
    /// Allocates the receive buffer once.
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            buffer: FixedBuffer::new(settings.max_frame_size),
            settings,
            result: None,
            successes: 0,
            failures: 0,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Last successful photo.
    pub fn result(&self) -> Option<&CaptureResult> {
        self.result.as_ref()
    }

    /// Hands the last photo over, leaving none behind.
    pub fn take_result(&mut self) -> Option<CaptureResult> {
        self.result.take()
    }

    /// Successful captures so far.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Failed captures so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Takes one photo. On success the previous result is replaced.
    pub fn capture_once<T: CameraTransport>(
        &mut self,
        link: &mut CameraLink<T>,
    ) -> Result<&CaptureResult, CaptureError> {
        match self.run(link) {
            Ok(()) => {
                self.successes += 1;
                self.result.as_ref().ok_or_else(|| ProtocolError::NoFrame.into())
            }
            Err(e) => {
                self.failures += 1;
                tracing::warn!(
                    error = %e,
                    kind = e.kind(),
                    restore_pending = link.mode_state().restore_pending(),
                    "Snapshot failed"
                );
                Err(e)
            }
        }
    }

    fn run<T: CameraTransport>(&mut self, link: &mut CameraLink<T>) -> Result<(), CaptureError> {
        let delay = self.settings.settle_delay;

        settle(delay);
        link.stop_live();
        settle(delay);

        link.switch_to(CameraMode::Capture)?;

        let mut response = fetch_photo(link, delay, self.settings.max_content_length)?;
        read_bounded(&mut response.body, response.content_length, &mut self.buffer)?;
        drop(response);

        let frame = trim_to_eoi(self.buffer.as_slice());
        if frame.is_empty() {
            return Err(ProtocolError::NoFrame.into());
        }

        let size = parse_frame_size(frame).ok();
        match size {
            Some(size) => tracing::info!(bytes = frame.len(), width = size.width, height = size.height, "Snapshot captured"),
            None => tracing::info!(bytes = frame.len(), "Snapshot captured without frame header"),
        }
        self.result = Some(CaptureResult {
            bytes: frame.to_vec(),
            size,
        });

        link.restore_preview()?;
        link.request_restart();
        Ok(())
    }
}

/// Writes a photo to `<images_root>/IMG_<date>_<time>.jpg`, creating the
/// directory if needed.
pub fn persist_snapshot<S: Storage>(
    storage: &mut S,
    images_root: &Path,
    result: &CaptureResult,
    taken_at: &NaiveDateTime,
) -> Result<PathBuf, StorageError> {
    ensure_directory(storage, images_root)?;
    let path = images_root.join(snapshot_file_name(taken_at));
    write_file(storage, &path, result.bytes())?;
    tracing::info!(path = %path.display(), bytes = result.len(), "Snapshot saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraProfiles, MockReply, MockTransport};
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            settle_delay: Duration::ZERO,
            ..CaptureSettings::default()
        }
    }

    fn photo() -> Vec<u8> {
        vec![
            0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x04, 0xB0, 0x06, 0x40, 0x01, 0xFF, 0xD9,
        ]
    }

    fn live_link() -> CameraLink<MockTransport> {
        let mut link = CameraLink::new(MockTransport::new(), CameraProfiles::default());
        link.start_live().unwrap();
        link.transport_mut().clear_requests();
        link
    }

    #[test]
    fn test_capture_protocol_order() {
        let mut link = live_link();
        let mut body = photo();
        body.extend_from_slice(&[0, 0, 0]);
        link.transport_mut()
            .push("/capture", MockReply::status(500))
            .push("/capture", MockReply::jpeg(body));

        let mut snapshot = SnapshotCapture::new(settings());
        let result = snapshot.capture_once(&mut link).unwrap();

        assert_eq!(result.bytes(), photo().as_slice());
        assert_eq!(result.size(), Some(FrameSize { width: 1600, height: 1200 }));
        assert_eq!(
            link.transport().requests(),
            &[
                "/control?var=framesize&val=13".to_string(),
                "/control?var=quality&val=2".to_string(),
                "/capture".to_string(),
                "/capture".to_string(),
                "/control?var=framesize&val=6".to_string(),
                "/control?var=quality&val=0".to_string(),
            ]
        );
        assert!(!link.is_live());
        assert!(link.restart_requested());
        assert!(link.mode_state().is_preview());
        assert_eq!(snapshot.successes(), 1);
    }

    #[test]
    fn test_mode_switch_failure_fetches_nothing() {
        let mut link = live_link();
        link.transport_mut()
            .push("/control?var=framesize&val=13", MockReply::status(500));

        let mut snapshot = SnapshotCapture::new(settings());
        let err = snapshot.capture_once(&mut link).unwrap_err();

        assert!(matches!(err, CaptureError::ModeSwitch(_)));
        assert_eq!(link.transport().count("/capture"), 0);
        assert_eq!(snapshot.failures(), 1);
        assert!(snapshot.result().is_none());
    }

    #[test]
    fn test_bad_content_type_leaves_capture_mode() {
        let mut link = live_link();
        link.transport_mut()
            .push("/capture", MockReply::ok())
            .push(
                "/capture",
                MockReply::jpeg(photo()).with_content_type(Some("text/html")),
            );

        let mut snapshot = SnapshotCapture::new(settings());
        let err = snapshot.capture_once(&mut link).unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Protocol(ProtocolError::UnexpectedContentType(_))
        ));
        assert_eq!(link.transport().count("/control?var=framesize&val=6"), 0);
        assert!(link.mode_state().restore_pending());
    }

    #[test]
    fn test_body_without_frame() {
        let mut link = live_link();
        link.transport_mut()
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::raw(vec![0xFF, 0xD8, 1, 2, 3]));

        let mut snapshot = SnapshotCapture::new(settings());
        assert!(matches!(
            snapshot.capture_once(&mut link),
            Err(CaptureError::Protocol(ProtocolError::NoFrame))
        ));
    }

    #[test]
    fn test_oversized_body_is_truncated() {
        let mut link = live_link();
        link.transport_mut()
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::raw(vec![0u8; 64]));

        let mut snapshot = SnapshotCapture::new(CaptureSettings {
            max_frame_size: 32,
            ..settings()
        });
        assert!(matches!(
            snapshot.capture_once(&mut link),
            Err(CaptureError::Protocol(ProtocolError::Truncated { received: 32 }))
        ));
    }

    #[test]
    fn test_persist_names_by_time() {
        let mut storage = MemoryStorage::new();
        let result = CaptureResult {
            bytes: photo(),
            size: None,
        };
        let taken_at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();

        let path = persist_snapshot(&mut storage, Path::new("/images"), &result, &taken_at).unwrap();
        assert_eq!(path, PathBuf::from("/images/IMG_20240309_070501.jpg"));
        assert_eq!(storage.read_whole(&path).unwrap(), photo());
    }
}
