//! Full control-loop scenarios against the scripted camera and in-memory
//! storage.

use camfeed::camera::{CameraLink, CameraProfiles, MockReply, MockTransport};
use camfeed::capture::CaptureSettings;
use camfeed::controller::{ControlEvent, ControlInput, Controller, ControllerSettings};
use camfeed::display::RecordingDisplay;
use camfeed::storage::{EntryName, MemoryStorage, Storage};
use camfeed::timelapse::{TickOutcome, TimelapseScheduler, TimelapseSettings, UserInput};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const INTERVAL: Duration = Duration::from_secs(5);

fn photo(tag: u8) -> Vec<u8> {
    vec![
        0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x02, 0x58, 0x03, 0x20, tag, 0xFF, 0xD9,
    ]
}

fn instant_capture() -> CaptureSettings {
    CaptureSettings {
        settle_delay: Duration::ZERO,
        ..CaptureSettings::default()
    }
}

fn timelapse_settings() -> TimelapseSettings {
    TimelapseSettings {
        root: PathBuf::from("/images/timelapse"),
        capture: instant_capture(),
        ..TimelapseSettings::default()
    }
}

#[test]
fn test_three_ticks_three_photos() {
    let mut transport = MockTransport::new();
    for tag in 0..3 {
        transport
            .push("/capture", MockReply::ok())
            .push("/capture", MockReply::jpeg(photo(tag)));
    }
    let mut link = CameraLink::new(transport, CameraProfiles::default());
    let mut storage = MemoryStorage::new();
    let mut display = RecordingDisplay::new();
    let mut scheduler = TimelapseScheduler::new(timelapse_settings());

    let t0 = Instant::now();
    assert_eq!(scheduler.start(t0, &mut link, &mut storage).unwrap(), 0);

    for n in 1..=3u32 {
        let outcome = scheduler.tick(t0 + INTERVAL * n, UserInput::None, &mut link, &mut storage, &mut display);
        assert!(matches!(outcome, TickOutcome::Saved(_)), "tick {n}: {outcome:?}");
    }

    assert_eq!(scheduler.session().unwrap().photo_count, 3);

    let dir = Path::new("/images/timelapse/0");
    let names = storage.list_entry_names(dir).unwrap();
    assert_eq!(
        names,
        vec![
            EntryName::file("IMG_0_0000.jpg"),
            EntryName::file("IMG_0_0001.jpg"),
            EntryName::file("IMG_0_0002.jpg"),
        ]
    );
    for tag in 0..3u8 {
        let path = dir.join(format!("IMG_0_000{tag}.jpg"));
        assert_eq!(storage.read_whole(&path).unwrap(), photo(tag));
    }

    let summary = scheduler.stop(t0 + INTERVAL * 4, &mut link, &mut display).unwrap();
    assert_eq!(summary.photo_count, 3);
    assert!(summary.preview_restored);
    assert!(link.restart_requested());
}

#[test]
fn test_second_session_gets_next_id() {
    let storage = MemoryStorage::new();
    storage.create_dir_all(Path::new("/images/timelapse/0"));
    storage.create_dir_all(Path::new("/images/timelapse/2"));
    storage.create_dir_all(Path::new("/images/timelapse/5"));

    let mut link = CameraLink::new(MockTransport::new(), CameraProfiles::default());
    let mut scheduler = TimelapseScheduler::new(timelapse_settings());
    let mut handle = storage.clone();

    assert_eq!(scheduler.start(Instant::now(), &mut link, &mut handle).unwrap(), 6);
    assert!(storage.exists(Path::new("/images/timelapse/6")));
}

#[test]
fn test_controller_preview_snapshot_and_resume() {
    let mut stream = photo(1);
    stream.extend(photo(2));

    let mut transport = MockTransport::new();
    transport
        .push("/stream", MockReply::raw(stream))
        .push("/capture", MockReply::status(200))
        .push("/capture", MockReply::jpeg(photo(9)))
        .set_default("/stream", MockReply::raw(photo(3)));

    let storage = MemoryStorage::new();
    let settings = ControllerSettings {
        images_root: PathBuf::from("/images"),
        reconnect_backoff: Duration::ZERO,
        capture: instant_capture(),
        timelapse: timelapse_settings(),
        ..ControllerSettings::default()
    };
    let mut controller = Controller::new(
        CameraLink::new(transport, CameraProfiles::default()),
        storage.clone(),
        RecordingDisplay::new(),
        settings,
    );

    let t0 = Instant::now();
    controller.poll(t0, ControlInput::None);
    assert!(matches!(controller.poll(t0, ControlInput::None), ControlEvent::FrameShown));
    assert_eq!(controller.display().draws().len(), 1);

    match controller.poll(t0, ControlInput::Snapshot) {
        ControlEvent::SnapshotSaved(path) => {
            assert_eq!(storage.read_whole(&path).unwrap(), photo(9));
        }
        other => panic!("unexpected event {other:?}"),
    }

    // The snapshot reconnected the feed; the next pass shows a fresh frame.
    assert!(controller.link().is_live());
    assert!(matches!(controller.poll(t0, ControlInput::None), ControlEvent::FrameShown));

    let metrics = controller.metrics_snapshot();
    assert_eq!(metrics.snapshots_succeeded, 1);
    assert_eq!(metrics.stream_reconnects, 2);
    assert_eq!(metrics.frames_delivered, 2);
    assert!(metrics.camera_preview);
    assert!(!metrics.restore_pending);
}
