//! The device control loop.
//!
//! [`Controller::poll`] is one pass of the loop. Each pass does a bounded
//! amount of work: either one timelapse tick, or one user action followed
//! by one demux pass over the live feed and, if a frame is ready, one draw.

use crate::camera::{Adjustment, CameraLink, CameraMode, CameraTransport, ControlVar, LinkError};
use crate::capture::{persist_snapshot, CaptureError, CaptureSettings, SnapshotCapture};
use crate::config::FileConfig;
use crate::display::{centered_origin, Display};
use crate::jpeg::{parse_frame_size, FrameSize};
use crate::metrics::MetricsSnapshot;
use crate::storage::Storage;
use crate::stream::{FrameSlot, StreamDemux, DEFAULT_BYTES_PER_POLL, DEFAULT_MAX_FRAME_SIZE};
use crate::timelapse::{StopSummary, TickOutcome, TimelapseScheduler, TimelapseSettings, UserInput};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A user action, already mapped from keys by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlInput {
    /// No input this pass.
    #[default]
    None,
    /// Take a snapshot and save it.
    Snapshot,
    /// Start a timelapse session.
    StartTimelapse,
    /// Set the special effect (0 to 6).
    SetEffect(i8),
    /// Step an image parameter by one.
    Adjust(ControlVar, Adjustment),
    /// A key with no action of its own; wakes the screen during a session.
    Key,
    /// The exit gesture; ends a timelapse session.
    Exit,
}

impl From<ControlInput> for UserInput {
    fn from(input: ControlInput) -> Self {
        match input {
            ControlInput::None => UserInput::None,
            ControlInput::Exit => UserInput::Exit,
            _ => UserInput::Key,
        }
    }
}

/// What one pass did.
#[derive(Debug)]
pub enum ControlEvent {
    /// Nothing visible happened.
    Idle,
    /// A live frame was drawn.
    FrameShown,
    /// A snapshot was saved.
    SnapshotSaved(PathBuf),
    /// A snapshot failed.
    SnapshotFailed(CaptureError),
    /// A timelapse session started.
    TimelapseStarted(u32),
    /// A timelapse session could not start.
    TimelapseFailed(CaptureError),
    /// A timelapse tick ran.
    Timelapse(TickOutcome),
    /// A parameter was changed.
    ParameterSet {
        /// Variable changed.
        var: ControlVar,
        /// New value.
        value: i8,
    },
    /// A parameter was already at its bound; nothing was sent.
    ParameterUnchanged(ControlVar),
    /// The camera rejected a parameter change.
    ParameterFailed(LinkError),
}

/// Controller tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Frame slot and demux capacity.
    pub max_frame_size: usize,
    /// Live feed bytes consumed per pass.
    pub bytes_per_poll: usize,
    /// Wait after the live feed fails or closes before reconnecting.
    pub reconnect_backoff: Duration,
    /// Live feed silence after which the feed is dropped and reopened.
    pub stream_idle_timeout: Duration,
    /// Directory snapshots are saved to.
    pub images_root: PathBuf,
    /// Snapshot protocol settings.
    pub capture: CaptureSettings,
    /// Timelapse settings.
    pub timelapse: TimelapseSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            bytes_per_poll: DEFAULT_BYTES_PER_POLL,
            reconnect_backoff: Duration::from_secs(2),
            stream_idle_timeout: Duration::from_secs(10),
            images_root: PathBuf::from("images"),
            capture: CaptureSettings::default(),
            timelapse: TimelapseSettings::default(),
        }
    }
}

impl ControllerSettings {
    /// Settings from a loaded configuration file.
    pub fn from_config(config: &FileConfig) -> Self {
        Self {
            max_frame_size: config.stream.max_frame_size,
            bytes_per_poll: config.stream.bytes_per_poll,
            reconnect_backoff: config.reconnect_backoff(),
            stream_idle_timeout: config.stream_idle_timeout(),
            images_root: config.capture.images_root.clone(),
            capture: config.capture_settings(),
            timelapse: config.timelapse_settings(),
        }
    }
}

fn parameter_event(var: ControlVar, result: Result<Option<i8>, LinkError>) -> ControlEvent {
    match result {
        Ok(Some(value)) => ControlEvent::ParameterSet { var, value },
        Ok(None) => ControlEvent::ParameterUnchanged(var),
        Err(e) => {
            tracing::warn!(%var, error = %e, "Parameter change failed");
            ControlEvent::ParameterFailed(e)
        }
    }
}

/// Owns every component and runs them one pass at a time.
pub struct Controller<T: CameraTransport, S: Storage, D: Display> {
    link: CameraLink<T>,
    storage: S,
    display: D,
    slot: FrameSlot,
    demux: StreamDemux,
    snapshot: SnapshotCapture,
    timelapse: TimelapseScheduler,
    images_root: PathBuf,
    reconnect_backoff: Duration,
    stream_idle_timeout: Duration,
    next_connect_at: Option<Instant>,
    last_live_data: Option<Instant>,
    size_cache: Option<(u64, FrameSize)>,
    stream_reconnects: u64,
    started: bool,
}

impl<T: CameraTransport, S: Storage, D: Display> Controller<T, S, D> {
    /// Assembles a controller. No request is made until the first pass.
    pub fn new(link: CameraLink<T>, storage: S, display: D, settings: ControllerSettings) -> Self {
        Self {
            link,
            storage,
            display,
            slot: FrameSlot::new(settings.max_frame_size),
            demux: StreamDemux::new(settings.max_frame_size, settings.bytes_per_poll),
            snapshot: SnapshotCapture::new(settings.capture),
            timelapse: TimelapseScheduler::new(settings.timelapse),
            images_root: settings.images_root,
            reconnect_backoff: settings.reconnect_backoff,
            stream_idle_timeout: settings.stream_idle_timeout,
            next_connect_at: None,
            last_live_data: None,
            size_cache: None,
            stream_reconnects: 0,
            started: false,
        }
    }

    /// The camera link.
    pub fn link(&self) -> &CameraLink<T> {
        &self.link
    }

    /// The camera link, mutably.
    pub fn link_mut(&mut self) -> &mut CameraLink<T> {
        &mut self.link
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The display.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// The frame slot.
    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    /// The snapshot orchestrator.
    pub fn snapshot(&self) -> &SnapshotCapture {
        &self.snapshot
    }

    /// The timelapse scheduler.
    pub fn timelapse(&self) -> &TimelapseScheduler {
        &self.timelapse
    }

    /// Cached live frame size, if still valid for the current resolution.
    pub fn cached_frame_size(&self) -> Option<FrameSize> {
        self.size_cache
            .filter(|(epoch, _)| *epoch == self.link.resolution_epoch())
            .map(|(_, size)| size)
    }

    /// Puts the camera in preview mode. Runs once, before the first pass.
    pub fn startup(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        match self.link.switch_to(CameraMode::Preview) {
            Ok(()) => tracing::info!("Camera ready for preview"),
            Err(e) => tracing::warn!(error = %e, "Failed to set preview mode at startup"),
        }
    }

    /// Runs one pass of the control loop.
    pub fn poll(&mut self, now: Instant, input: ControlInput) -> ControlEvent {
        self.startup();

        if self.timelapse.is_active() {
            let outcome = self.timelapse.tick(
                now,
                input.into(),
                &mut self.link,
                &mut self.storage,
                &mut self.display,
            );
            return ControlEvent::Timelapse(outcome);
        }

        let action = self.handle_input(now, input);
        if self.timelapse.is_active() {
            return action.unwrap_or(ControlEvent::Idle);
        }

        self.service_live(now);
        let shown = self.show_frame();

        match action {
            Some(event) => event,
            None if shown => ControlEvent::FrameShown,
            None => ControlEvent::Idle,
        }
    }

    /// Stops a running timelapse so the camera is back in preview mode.
    pub fn shutdown(&mut self, now: Instant) -> Option<StopSummary> {
        self.link.stop_live();
        self.timelapse.stop(now, &mut self.link, &mut self.display)
    }

    /// Current counters and state for the metrics registry.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::from_components(
            self.demux.stats(),
            self.stream_reconnects,
            self.link.is_live(),
            &self.snapshot,
            &self.timelapse,
            self.link.mode_state(),
        )
    }

    fn handle_input(&mut self, now: Instant, input: ControlInput) -> Option<ControlEvent> {
        let event = match input {
            ControlInput::None | ControlInput::Key | ControlInput::Exit => return None,
            ControlInput::Snapshot => self.take_snapshot(),
            ControlInput::StartTimelapse => {
                match self.timelapse.start(now, &mut self.link, &mut self.storage) {
                    Ok(session_id) => ControlEvent::TimelapseStarted(session_id),
                    Err(e) => {
                        tracing::warn!(error = %e, "Timelapse start failed");
                        ControlEvent::TimelapseFailed(e)
                    }
                }
            }
            ControlInput::SetEffect(value) => {
                let result = self
                    .link
                    .set_parameter(ControlVar::SpecialEffect, value)
                    .map(|()| Some(value));
                parameter_event(ControlVar::SpecialEffect, result)
            }
            ControlInput::Adjust(var, step) => parameter_event(var, self.link.adjust(var, step)),
        };
        Some(event)
    }

    fn take_snapshot(&mut self) -> ControlEvent {
        let result = match self.snapshot.capture_once(&mut self.link) {
            Ok(result) => result,
            Err(e) => return ControlEvent::SnapshotFailed(e),
        };

        let taken_at = chrono::Local::now().naive_local();
        match persist_snapshot(&mut self.storage, &self.images_root, result, &taken_at) {
            Ok(path) => ControlEvent::SnapshotSaved(path),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save snapshot");
                ControlEvent::SnapshotFailed(e.into())
            }
        }
    }

    fn service_live(&mut self, now: Instant) {
        if !self.link.is_live() || self.link.restart_requested() {
            self.connect_live(now);
            return;
        }

        let Some(body) = self.link.live_mut() else {
            return;
        };
        match self.demux.poll(body, &mut self.slot) {
            Ok(outcome) if outcome.end_of_stream => {
                tracing::info!("Live feed closed by camera");
                self.drop_live(now);
            }
            Ok(outcome) if outcome.consumed > 0 => self.last_live_data = Some(now),
            Ok(_) => {
                let silent = self
                    .last_live_data
                    .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));
                if silent >= self.stream_idle_timeout {
                    tracing::warn!(silent_ms = silent.as_millis() as u64, "Live feed stalled");
                    self.drop_live(now);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Live feed read failed");
                self.drop_live(now);
            }
        }
    }

    fn connect_live(&mut self, now: Instant) {
        if self.next_connect_at.map_or(false, |at| now < at) {
            return;
        }

        let mode = self.link.mode_state();
        if !mode.is_preview() {
            tracing::warn!(
                framesize = ?mode.framesize(),
                restore_pending = mode.restore_pending(),
                "Resuming live feed outside preview mode"
            );
        }

        match self.link.start_live() {
            Ok(()) => {
                self.demux.reset();
                self.slot.reset();
                self.last_live_data = Some(now);
                self.next_connect_at = None;
                self.stream_reconnects += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = self.reconnect_backoff.as_millis() as u64, "Live feed connect failed");
                self.next_connect_at = Some(now + self.reconnect_backoff);
            }
        }
    }

    fn drop_live(&mut self, now: Instant) {
        self.link.stop_live();
        self.demux.reset();
        self.next_connect_at = Some(now + self.reconnect_backoff);
    }

    fn show_frame(&mut self) -> bool {
        let epoch = self.link.resolution_epoch();
        let cache = &mut self.size_cache;
        let display = &mut self.display;

        self.slot
            .consume(|frame| {
                let size = match *cache {
                    Some((cached_epoch, size)) if cached_epoch == epoch => Some(size),
                    _ => match parse_frame_size(frame) {
                        Ok(size) => {
                            tracing::debug!(width = size.width, height = size.height, "Live frame size");
                            *cache = Some((epoch, size));
                            Some(size)
                        }
                        Err(_) => None,
                    },
                };
                let (x, y) = centered_origin(size);
                display.draw_jpeg(frame, x, y);
            })
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraProfiles, MockReply, MockTransport};
    use crate::display::RecordingDisplay;
    use crate::storage::MemoryStorage;

    fn frame(width: u16, height: u16) -> Vec<u8> {
        let [wh, wl] = width.to_be_bytes();
        let [hh, hl] = height.to_be_bytes();
        vec![
            0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, hh, hl, wh, wl, 0x00, 0xFF, 0xD9,
        ]
    }

    fn controller(transport: MockTransport) -> Controller<MockTransport, MemoryStorage, RecordingDisplay> {
        let settings = ControllerSettings {
            images_root: PathBuf::from("/images"),
            capture: CaptureSettings {
                settle_delay: Duration::ZERO,
                ..CaptureSettings::default()
            },
            timelapse: TimelapseSettings {
                root: PathBuf::from("/images/timelapse"),
                capture: CaptureSettings {
                    settle_delay: Duration::ZERO,
                    ..CaptureSettings::default()
                },
                ..TimelapseSettings::default()
            },
            ..ControllerSettings::default()
        };
        Controller::new(
            CameraLink::new(transport, CameraProfiles::default()),
            MemoryStorage::new(),
            RecordingDisplay::new(),
            settings,
        )
    }

    #[test]
    fn test_startup_sets_preview_then_connects() {
        let mut ctl = controller(MockTransport::new());
        let now = Instant::now();
        ctl.poll(now, ControlInput::None);

        assert_eq!(
            ctl.link().transport().requests(),
            &[
                "/control?var=framesize&val=6".to_string(),
                "/control?var=quality&val=0".to_string(),
                "/stream".to_string(),
            ]
        );
        assert!(ctl.link().is_live());
        assert_eq!(ctl.metrics_snapshot().stream_reconnects, 1);
    }

    #[test]
    fn test_live_frame_is_centered() {
        let mut stream = frame(160, 120);
        stream.extend(frame(160, 120));
        let mut transport = MockTransport::new();
        transport.push("/stream", MockReply::raw(stream));

        let mut ctl = controller(transport);
        let now = Instant::now();
        ctl.poll(now, ControlInput::None);
        assert!(matches!(ctl.poll(now, ControlInput::None), ControlEvent::FrameShown));

        let draw = &ctl.display().draws()[0];
        assert_eq!((draw.x, draw.y), (40, 7));
        assert_eq!(draw.len, 14);
        assert_eq!(ctl.cached_frame_size(), Some(FrameSize { width: 160, height: 120 }));
        // The second frame arrived while the first was still in the slot.
        assert_eq!(ctl.metrics_snapshot().frames_dropped_busy, 1);
    }

    #[test]
    fn test_reconnect_waits_for_backoff() {
        let mut transport = MockTransport::new();
        transport.push("/stream", MockReply::status(503));
        let mut ctl = controller(transport);
        let now = Instant::now();

        ctl.poll(now, ControlInput::None);
        assert!(!ctl.link().is_live());
        ctl.poll(now + Duration::from_secs(1), ControlInput::None);
        assert_eq!(ctl.link().transport().count("/stream"), 1);

        ctl.poll(now + Duration::from_secs(2), ControlInput::None);
        assert_eq!(ctl.link().transport().count("/stream"), 2);
        assert!(ctl.link().is_live());
    }

    #[test]
    fn test_stalled_feed_is_reopened() {
        let mut transport = MockTransport::new();
        transport.push("/stream", MockReply::Stall(vec![0xFF, 0xD8, 0x01]));
        let mut ctl = controller(transport);
        let t0 = Instant::now();

        ctl.poll(t0, ControlInput::None);
        assert!(matches!(
            ctl.poll(t0 + Duration::from_secs(1), ControlInput::None),
            ControlEvent::Idle
        ));
        assert_eq!(ctl.metrics_snapshot().stream_bytes, 3);

        // Silence shorter than the idle limit keeps the feed open
        ctl.poll(t0 + Duration::from_secs(10), ControlInput::None);
        assert!(ctl.link().is_live());

        ctl.poll(t0 + Duration::from_secs(11), ControlInput::None);
        assert!(!ctl.link().is_live());
        assert_eq!(ctl.link().transport().count("/stream"), 1);

        ctl.poll(t0 + Duration::from_secs(13), ControlInput::None);
        assert!(ctl.link().is_live());
        assert_eq!(ctl.link().transport().count("/stream"), 2);
        assert_eq!(ctl.metrics_snapshot().stream_reconnects, 2);
    }

    #[test]
    fn test_reconnect_discards_stale_frame() {
        let mut transport = MockTransport::new();
        transport
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::jpeg(frame(1600, 1200)));
        let mut ctl = controller(transport);
        let now = Instant::now();

        ctl.poll(now, ControlInput::None);
        assert!(ctl.slot.offer(&frame(160, 120)));

        assert!(matches!(
            ctl.poll(now, ControlInput::Snapshot),
            ControlEvent::SnapshotSaved(_)
        ));
        assert_eq!(ctl.metrics_snapshot().stream_reconnects, 2);
        assert!(!ctl.slot().is_ready());
        assert!(ctl.display().draws().is_empty());
    }

    #[test]
    fn test_snapshot_is_saved() {
        let mut transport = MockTransport::new();
        transport
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::jpeg(frame(1600, 1200)));
        let mut ctl = controller(transport);

        match ctl.poll(Instant::now(), ControlInput::Snapshot) {
            ControlEvent::SnapshotSaved(path) => {
                assert!(path.starts_with("/images"));
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                assert!(name.starts_with("IMG_") && name.ends_with(".jpg"));
                assert_eq!(ctl.storage().read_whole(&path).unwrap(), frame(1600, 1200));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(ctl.link().is_live());
        assert!(ctl.link().mode_state().is_preview());
    }

    #[test]
    fn test_failed_restore_still_resumes_feed() {
        let mut transport = MockTransport::new();
        transport
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::raw(vec![1, 2, 3]));
        let mut ctl = controller(transport);

        assert!(matches!(
            ctl.poll(Instant::now(), ControlInput::Snapshot),
            ControlEvent::SnapshotFailed(CaptureError::Protocol(_))
        ));
        assert!(ctl.link().is_live());
        let metrics = ctl.metrics_snapshot();
        assert!(metrics.restore_pending);
        assert!(!metrics.camera_preview);
        assert_eq!(metrics.snapshots_failed, 1);
    }

    #[test]
    fn test_parameter_adjustments() {
        let mut ctl = controller(MockTransport::new());
        let now = Instant::now();
        let up = ControlInput::Adjust(ControlVar::Contrast, Adjustment::Increase);

        assert!(matches!(ctl.poll(now, up), ControlEvent::ParameterSet { value: 1, .. }));
        assert!(matches!(ctl.poll(now, up), ControlEvent::ParameterSet { value: 2, .. }));
        assert!(matches!(ctl.poll(now, up), ControlEvent::ParameterUnchanged(ControlVar::Contrast)));
        assert_eq!(ctl.link().transport().count("/control?var=contrast"), 2);

        assert!(matches!(
            ctl.poll(now, ControlInput::SetEffect(7)),
            ControlEvent::ParameterFailed(LinkError::Param(_))
        ));
        assert!(matches!(
            ctl.poll(now, ControlInput::SetEffect(2)),
            ControlEvent::ParameterSet { var: ControlVar::SpecialEffect, value: 2 }
        ));
    }

    #[test]
    fn test_timelapse_takes_over_loop() {
        let mut transport = MockTransport::new();
        transport.set_default("/capture", MockReply::jpeg(frame(800, 600)));
        let mut ctl = controller(transport);
        let t0 = Instant::now();

        ctl.poll(t0, ControlInput::None);
        assert!(matches!(ctl.poll(t0, ControlInput::StartTimelapse), ControlEvent::TimelapseStarted(0)));
        assert!(!ctl.link().is_live());

        ctl.link_mut().transport_mut().clear_requests();
        assert!(matches!(
            ctl.poll(t0 + Duration::from_secs(5), ControlInput::None),
            ControlEvent::Timelapse(TickOutcome::Saved(_))
        ));
        assert_eq!(ctl.link().transport().count("/stream"), 0);

        let summary = ctl.shutdown(t0 + Duration::from_secs(6)).unwrap();
        assert_eq!(summary.photo_count, 1);
        assert!(!ctl.timelapse().is_active());
    }
}
