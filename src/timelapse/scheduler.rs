//! Interval capture sessions.

use super::naming::{next_photo_sequence, next_session_id, photo_file_name};
use crate::camera::{CameraLink, CameraMode, CameraTransport};
use crate::capture::fetch::{copy_bounded, fetch_photo, settle};
use crate::capture::{CaptureError, CaptureSettings};
use crate::display::Display;
use crate::storage::{ensure_directory, Storage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default time between photos.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
/// Default inactivity before the screen is switched off.
pub const DEFAULT_SCREEN_OFF_TIMEOUT: Duration = Duration::from_secs(60);

/// Input seen by the scheduler during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserInput {
    /// Nothing pressed.
    #[default]
    None,
    /// Any key other than the exit gesture.
    Key,
    /// The gesture that ends the session.
    Exit,
}

/// Timing and storage settings for sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelapseSettings {
    /// Directory holding one numbered subdirectory per session.
    pub root: PathBuf,
    /// Time between photos.
    pub interval: Duration,
    /// Inactivity before the screen turns off.
    pub screen_off_timeout: Duration,
    /// Request limits and settle delay.
    pub capture: CaptureSettings,
}

impl Default for TimelapseSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("images/timelapse"),
            interval: DEFAULT_INTERVAL,
            screen_off_timeout: DEFAULT_SCREEN_OFF_TIMEOUT,
            capture: CaptureSettings::default(),
        }
    }
}

/// State of the running session.
#[derive(Debug, Clone)]
pub struct TimelapseSession {
    /// Numeric directory name.
    pub session_id: u32,
    /// Where photos go.
    pub directory: PathBuf,
    /// Photos saved in this session.
    pub photo_count: u32,
    /// Failed attempts in this session.
    pub failure_count: u32,
    /// When the last capture attempt finished, successful or not.
    pub last_shot_time: Instant,
    /// Session start.
    pub start_time: Instant,
    /// Whether the screen is on.
    pub screen_on: bool,
    /// Last key press.
    pub last_user_action_time: Instant,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No session is running.
    Inactive,
    /// Nothing due yet.
    Waiting,
    /// A photo was written.
    Saved(PathBuf),
    /// A capture was attempted and failed.
    Failed(CaptureError),
    /// The exit gesture ended the session.
    Stopped(StopSummary),
}

/// Final numbers of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSummary {
    /// Session that ended.
    pub session_id: u32,
    /// Photos saved.
    pub photo_count: u32,
    /// Failed attempts.
    pub failure_count: u32,
    /// Session length.
    pub elapsed: Duration,
    /// Whether preview mode was restored.
    pub preview_restored: bool,
}

/// Overlay view of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelapseStatus {
    /// Session id.
    pub session_id: u32,
    /// Photos saved.
    pub photo_count: u32,
    /// Time until the next photo, or `None` when one is due.
    pub next_shot_in: Option<Duration>,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Whether the screen is on.
    pub screen_on: bool,
}

impl fmt::Display for TimelapseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Photos: {}  ", self.photo_count)?;
        match self.next_shot_in {
            Some(left) => write!(f, "Next: {}s  ", left.as_secs())?,
            None => write!(f, "Capturing  ")?,
        }
        let secs = self.elapsed.as_secs();
        write!(
            f,
            "Elapsed: {:02}:{:02}:{:02}  Session: {}  Screen: {}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
            self.session_id,
            if self.screen_on { "on" } else { "off" }
        )
    }
}

/// Runs timelapse sessions: numbering, cadence and screen power.
///
/// Inactive until [`TimelapseScheduler::start`] succeeds. While active the
/// control loop calls [`TimelapseScheduler::tick`] once per pass and
/// nothing else touches the camera.
#[derive(Debug)]
pub struct TimelapseScheduler {
    settings: TimelapseSettings,
    session: Option<TimelapseSession>,
    total_photos: u64,
    total_failures: u64,
}

impl TimelapseScheduler {
    /// Creates an inactive scheduler.
    pub fn new(settings: TimelapseSettings) -> Self {
        Self {
            settings,
            session: None,
            total_photos: 0,
            total_failures: 0,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &TimelapseSettings {
        &self.settings
    }

    /// Returns true while a session runs.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The running session.
    pub fn session(&self) -> Option<&TimelapseSession> {
        self.session.as_ref()
    }

    /// Photos saved across all sessions.
    pub fn total_photos(&self) -> u64 {
        self.total_photos
    }

    /// Failed attempts across all sessions.
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Starts a session and returns its id.
    ///
    /// Allocates and creates the session directory, then stops the live
    /// feed and switches the camera to timelapse mode. Any failure leaves
    /// the scheduler inactive. Starting while active returns the running
    /// id.
    pub fn start<T: CameraTransport, S: Storage>(
        &mut self,
        now: Instant,
        link: &mut CameraLink<T>,
        storage: &mut S,
    ) -> Result<u32, CaptureError> {
        if let Some(session) = &self.session {
            tracing::warn!(session_id = session.session_id, "Timelapse already running");
            return Ok(session.session_id);
        }

        let root = self.settings.root.as_path();
        ensure_directory(storage, root)?;
        let session_id = next_session_id(&storage.list_entry_names(root)?);
        let directory = root.join(session_id.to_string());
        storage.make_directory(&directory)?;
        tracing::info!(session_id, directory = %directory.display(), "Timelapse directory created");

        link.stop_live();
        settle(self.settings.capture.settle_delay);
        if let Err(e) = link.switch_to(CameraMode::Timelapse) {
            tracing::warn!(session_id, error = %e, "Timelapse mode switch failed");
            return Err(e.into());
        }

        self.session = Some(TimelapseSession {
            session_id,
            directory,
            photo_count: 0,
            failure_count: 0,
            last_shot_time: now,
            start_time: now,
            screen_on: true,
            last_user_action_time: now,
        });
        tracing::info!(session_id, interval_ms = self.settings.interval.as_millis() as u64, "Timelapse started");
        Ok(session_id)
    }

    /// One control-loop pass of an active session.
    pub fn tick<T: CameraTransport, S: Storage, D: Display>(
        &mut self,
        now: Instant,
        input: UserInput,
        link: &mut CameraLink<T>,
        storage: &mut S,
        display: &mut D,
    ) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inactive;
        };

        if input != UserInput::None {
            session.last_user_action_time = now;
            if !session.screen_on {
                session.screen_on = true;
                display.set_power(true);
                tracing::debug!("Screen woken");
            } else if input == UserInput::Exit {
                return match self.stop(now, link, display) {
                    Some(summary) => TickOutcome::Stopped(summary),
                    None => TickOutcome::Inactive,
                };
            }
        }

        if session.screen_on
            && now.saturating_duration_since(session.last_user_action_time) >= self.settings.screen_off_timeout
        {
            session.screen_on = false;
            display.set_power(false);
            tracing::debug!("Screen off after inactivity");
        }

        if now.saturating_duration_since(session.last_shot_time) < self.settings.interval {
            return TickOutcome::Waiting;
        }

        let session_id = session.session_id;
        let directory = session.directory.clone();
        let started = Instant::now();
        let result = capture_photo(link, storage, &self.settings.capture, session_id, &directory);
        let finished = now + started.elapsed();

        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inactive;
        };
        session.last_shot_time = finished;

        match result {
            Ok(path) => {
                session.photo_count += 1;
                self.total_photos += 1;
                tracing::info!(session_id, photo_count = session.photo_count, path = %path.display(), "Timelapse photo saved");
                TickOutcome::Saved(path)
            }
            Err(e) => {
                session.failure_count += 1;
                self.total_failures += 1;
                tracing::warn!(session_id, error = %e, kind = e.kind(), "Timelapse capture failed");
                TickOutcome::Failed(e)
            }
        }
    }

    /// Ends the session: restores preview mode (both calls attempted),
    /// turns the screen on and asks for the live feed back.
    pub fn stop<T: CameraTransport, D: Display>(
        &mut self,
        now: Instant,
        link: &mut CameraLink<T>,
        display: &mut D,
    ) -> Option<StopSummary> {
        let session = self.session.take()?;

        let preview_restored = link.restore_preview().is_ok();
        display.set_power(true);
        link.request_restart();

        let summary = StopSummary {
            session_id: session.session_id,
            photo_count: session.photo_count,
            failure_count: session.failure_count,
            elapsed: now.saturating_duration_since(session.start_time),
            preview_restored,
        };
        tracing::info!(
            session_id = summary.session_id,
            photo_count = summary.photo_count,
            failures = summary.failure_count,
            preview_restored,
            "Timelapse stopped"
        );
        Some(summary)
    }

    /// Overlay view at `now`, if a session runs.
    pub fn status(&self, now: Instant) -> Option<TimelapseStatus> {
        let session = self.session.as_ref()?;
        let since_shot = now.saturating_duration_since(session.last_shot_time);
        let next_shot_in = self.settings.interval.checked_sub(since_shot).filter(|left| !left.is_zero());

        Some(TimelapseStatus {
            session_id: session.session_id,
            photo_count: session.photo_count,
            next_shot_in,
            elapsed: now.saturating_duration_since(session.start_time),
            screen_on: session.screen_on,
        })
    }
}

/// Fetches one photo and streams it into the next numbered file.
fn capture_photo<T: CameraTransport, S: Storage>(
    link: &mut CameraLink<T>,
    storage: &mut S,
    settings: &CaptureSettings,
    session_id: u32,
    directory: &Path,
) -> Result<PathBuf, CaptureError> {
    let mut response = fetch_photo(link, settings.settle_delay, settings.max_content_length)?;

    let sequence = next_photo_sequence(&storage.list_entry_names(directory)?);
    let path = directory.join(photo_file_name(session_id, sequence));
    let mut file = storage.create_writable_file(&path)?;

    let written = copy_bounded(
        &mut response.body,
        response.content_length,
        settings.max_content_length,
        &mut file,
        &path,
    )?;
    tracing::debug!(path = %path.display(), bytes = written, "Photo written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraProfiles, MockReply, MockTransport};
    use crate::display::RecordingDisplay;
    use crate::storage::{EntryName, MemoryStorage};

    const JPEG: [u8; 6] = [0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];

    struct Rig {
        link: CameraLink<MockTransport>,
        storage: MemoryStorage,
        display: RecordingDisplay,
        scheduler: TimelapseScheduler,
        t0: Instant,
    }

    fn rig() -> Rig {
        let mut transport = MockTransport::new();
        transport.set_default("/capture", MockReply::jpeg(JPEG.to_vec()));
        Rig {
            link: CameraLink::new(transport, CameraProfiles::default()),
            storage: MemoryStorage::new(),
            display: RecordingDisplay::new(),
            scheduler: TimelapseScheduler::new(TimelapseSettings {
                root: PathBuf::from("/images/timelapse"),
                capture: CaptureSettings {
                    settle_delay: Duration::ZERO,
                    ..CaptureSettings::default()
                },
                ..TimelapseSettings::default()
            }),
            t0: Instant::now(),
        }
    }

    impl Rig {
        fn start(&mut self) -> u32 {
            self.scheduler
                .start(self.t0, &mut self.link, &mut self.storage)
                .unwrap()
        }

        fn tick(&mut self, after: Duration, input: UserInput) -> TickOutcome {
            self.scheduler.tick(
                self.t0 + after,
                input,
                &mut self.link,
                &mut self.storage,
                &mut self.display,
            )
        }
    }

    #[test]
    fn test_session_id_follows_existing() {
        let mut rig = rig();
        for dir in ["0", "2", "5"] {
            rig.storage.create_dir_all(&Path::new("/images/timelapse").join(dir));
        }
        assert_eq!(rig.start(), 6);
        assert!(rig.storage.exists(Path::new("/images/timelapse/6")));
        assert_eq!(rig.link.mode_state().mode(), Some(CameraMode::Timelapse));
    }

    #[test]
    fn test_mode_switch_failure_stays_inactive() {
        let mut rig = rig();
        rig.link
            .transport_mut()
            .push("/control?var=quality&val=2", MockReply::status(500));

        let err = rig
            .scheduler
            .start(rig.t0, &mut rig.link, &mut rig.storage)
            .unwrap_err();
        assert!(matches!(err, CaptureError::ModeSwitch(_)));
        assert!(!rig.scheduler.is_active());
        assert!(rig.storage.exists(Path::new("/images/timelapse/0")));
    }

    #[test]
    fn test_sequence_continues_existing_files() {
        let mut rig = rig();
        assert_eq!(rig.start(), 0);
        for name in ["IMG_0_0000.jpg", "IMG_0_0003.jpg"] {
            let path = Path::new("/images/timelapse/0").join(name);
            rig.storage.create_writable_file(&path).unwrap();
        }

        match rig.tick(DEFAULT_INTERVAL, UserInput::None) {
            TickOutcome::Saved(path) => {
                assert_eq!(path, PathBuf::from("/images/timelapse/0/IMG_0_0004.jpg"));
                assert_eq!(rig.storage.read_whole(&path).unwrap(), JPEG.to_vec());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_waits_for_interval() {
        let mut rig = rig();
        rig.start();
        rig.link.transport_mut().clear_requests();

        assert!(matches!(rig.tick(Duration::from_secs(4), UserInput::None), TickOutcome::Waiting));
        assert_eq!(rig.link.transport().count("/capture"), 0);
        assert!(matches!(rig.tick(Duration::from_secs(5), UserInput::None), TickOutcome::Saved(_)));
        assert_eq!(rig.link.transport().count("/capture"), 2);
    }

    #[test]
    fn test_failed_capture_refreshes_shot_time() {
        let mut rig = rig();
        rig.start();
        rig.link
            .transport_mut()
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::status(503));

        let at = Duration::from_secs(5);
        assert!(matches!(rig.tick(at, UserInput::None), TickOutcome::Failed(_)));

        let session = rig.scheduler.session().unwrap();
        assert!(session.last_shot_time >= rig.t0 + at);
        assert!(session.last_shot_time < rig.t0 + Duration::from_secs(6));
        assert_eq!(session.photo_count, 0);
        assert_eq!(session.failure_count, 1);
        assert!(matches!(rig.tick(Duration::from_secs(6), UserInput::None), TickOutcome::Waiting));
    }

    #[test]
    fn test_interval_counts_from_attempt_end() {
        let settle = Duration::from_millis(30);
        let interval = Duration::from_millis(40);
        let mut rig = rig();
        rig.scheduler = TimelapseScheduler::new(TimelapseSettings {
            root: PathBuf::from("/images/timelapse"),
            interval,
            capture: CaptureSettings {
                settle_delay: settle,
                ..CaptureSettings::default()
            },
            ..TimelapseSettings::default()
        });
        rig.start();
        rig.link
            .transport_mut()
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::status(503));

        assert!(matches!(rig.tick(interval, UserInput::None), TickOutcome::Failed(_)));
        let finished = rig.scheduler.session().unwrap().last_shot_time;
        assert!(finished >= rig.t0 + interval + settle);

        // Less than one interval after the attempt ended, even though more
        // than one has passed since the tick that started it.
        let early = finished + interval - Duration::from_millis(1) - rig.t0;
        assert!(early - interval > interval);
        assert!(matches!(rig.tick(early, UserInput::None), TickOutcome::Waiting));
        assert_eq!(rig.scheduler.session().unwrap().failure_count, 1);
    }

    #[test]
    fn test_short_body_counts_as_failure() {
        let mut rig = rig();
        rig.start();
        rig.link
            .transport_mut()
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::jpeg(JPEG.to_vec()).with_content_length(Some(100)));

        assert!(matches!(
            rig.tick(DEFAULT_INTERVAL, UserInput::None),
            TickOutcome::Failed(CaptureError::Protocol(_))
        ));
        let names = rig.storage.list_entry_names(Path::new("/images/timelapse/0")).unwrap();
        assert_eq!(names, vec![EntryName::file("IMG_0_0000.jpg")]);
        assert_eq!(rig.scheduler.session().unwrap().photo_count, 0);
    }

    #[test]
    fn test_screen_power_policy() {
        let mut rig = rig();
        rig.start();
        let minute = DEFAULT_SCREEN_OFF_TIMEOUT;

        rig.tick(minute - Duration::from_millis(1), UserInput::None);
        assert!(rig.display.is_on());

        rig.tick(minute, UserInput::None);
        assert!(!rig.display.is_on());
        assert!(!rig.scheduler.session().unwrap().screen_on);

        // The exit gesture only wakes a dark screen.
        rig.tick(minute + Duration::from_secs(1), UserInput::Exit);
        assert!(rig.display.is_on());
        assert!(rig.scheduler.is_active());

        match rig.tick(minute + Duration::from_secs(2), UserInput::Exit) {
            TickOutcome::Stopped(summary) => {
                assert_eq!(summary.session_id, 0);
                assert!(summary.preview_restored);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!rig.scheduler.is_active());
        assert!(rig.link.restart_requested());
        assert!(rig.link.mode_state().is_preview());
    }

    #[test]
    fn test_stop_attempts_full_restore() {
        let mut rig = rig();
        rig.start();
        rig.link
            .transport_mut()
            .push("/control?var=framesize&val=6", MockReply::status(500));

        let summary = rig
            .scheduler
            .stop(rig.t0 + Duration::from_secs(9), &mut rig.link, &mut rig.display)
            .unwrap();
        assert!(!summary.preview_restored);
        assert_eq!(summary.elapsed, Duration::from_secs(9));
        assert_eq!(rig.link.transport().count("/control?var=quality&val=0"), 1);
        assert!(rig.link.restart_requested());
        assert!(rig.scheduler.stop(rig.t0, &mut rig.link, &mut rig.display).is_none());
    }

    #[test]
    fn test_status_view() {
        let mut rig = rig();
        assert!(rig.scheduler.status(rig.t0).is_none());
        rig.start();

        let status = rig.scheduler.status(rig.t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(status.next_shot_in, Some(Duration::from_secs(3)));
        assert_eq!(
            status.to_string(),
            "Photos: 0  Next: 3s  Elapsed: 00:00:02  Session: 0  Screen: on"
        );

        let due = rig.scheduler.status(rig.t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(due.next_shot_in, None);
        assert!(due.to_string().contains("Capturing"));
    }
}
