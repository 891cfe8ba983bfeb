//! Metrics collection and registry.

use crate::camera::CameraModeState;
use crate::capture::SnapshotCapture;
use crate::stream::DemuxStats;
use crate::timelapse::TimelapseScheduler;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be created or registered.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of controller state for metrics update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Live feed bytes consumed by the demultiplexer.
    pub stream_bytes: u64,
    /// Frames handed to the display slot.
    pub frames_delivered: u64,
    /// Complete frames dropped because the slot was still full.
    pub frames_dropped_busy: u64,
    /// Partial frames discarded for exceeding the capacity.
    pub frames_oversized: u64,
    /// Live feed connections opened.
    pub stream_reconnects: u64,
    /// Whether the live feed is connected.
    pub stream_connected: bool,
    /// Successful snapshots.
    pub snapshots_succeeded: u64,
    /// Failed snapshots.
    pub snapshots_failed: u64,
    /// Timelapse photos saved.
    pub timelapse_photos: u64,
    /// Failed timelapse captures.
    pub timelapse_failures: u64,
    /// Whether a timelapse session runs.
    pub timelapse_active: bool,
    /// Whether the camera is known to be in preview mode.
    pub camera_preview: bool,
    /// Whether the camera still needs to be returned to preview mode.
    pub restore_pending: bool,
}

/// Prometheus metrics registry for the capture controller.
pub struct MetricsRegistry {
    registry: Registry,

    // Live feed metrics
    stream_bytes_total: IntCounter,
    frames_delivered_total: IntCounter,
    frames_dropped_busy_total: IntCounter,
    frames_oversized_total: IntCounter,
    stream_reconnects_total: IntCounter,
    stream_connected: IntGauge,

    // Capture metrics
    snapshots_succeeded_total: IntCounter,
    snapshots_failed_total: IntCounter,
    timelapse_photos_total: IntCounter,
    timelapse_failures_total: IntCounter,
    timelapse_active: IntGauge,

    // Camera mode metrics
    camera_preview: IntGauge,
    restore_pending: IntGauge,
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all controller metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let stream_bytes_total = IntCounter::new(
            "camfeed_stream_bytes_total",
            "Live feed bytes consumed by the demultiplexer",
        )?;
        let frames_delivered_total = IntCounter::new(
            "camfeed_frames_delivered_total",
            "Complete frames handed to the display slot",
        )?;
        let frames_dropped_busy_total = IntCounter::new(
            "camfeed_frames_dropped_busy_total",
            "Complete frames dropped because the slot was full",
        )?;
        let frames_oversized_total = IntCounter::new(
            "camfeed_frames_oversized_total",
            "Partial frames discarded for exceeding the frame capacity",
        )?;
        let stream_reconnects_total = IntCounter::new(
            "camfeed_stream_reconnects_total",
            "Live feed connections opened",
        )?;
        let stream_connected = IntGauge::new(
            "camfeed_stream_connected",
            "Live feed connection state (1=connected, 0=disconnected)",
        )?;

        let snapshots_succeeded_total = IntCounter::new(
            "camfeed_snapshots_succeeded_total",
            "Snapshots captured successfully",
        )?;
        let snapshots_failed_total = IntCounter::new(
            "camfeed_snapshots_failed_total",
            "Snapshot attempts that failed",
        )?;
        let timelapse_photos_total = IntCounter::new(
            "camfeed_timelapse_photos_total",
            "Timelapse photos written to storage",
        )?;
        let timelapse_failures_total = IntCounter::new(
            "camfeed_timelapse_failures_total",
            "Timelapse capture attempts that failed",
        )?;
        let timelapse_active = IntGauge::new(
            "camfeed_timelapse_active",
            "Timelapse session state (1=running, 0=idle)",
        )?;

        let camera_preview = IntGauge::new(
            "camfeed_camera_preview",
            "Camera known to be in preview mode (1=yes, 0=no or unknown)",
        )?;
        let restore_pending = IntGauge::new(
            "camfeed_camera_restore_pending",
            "Camera left outside preview mode by a failed switch",
        )?;

        registry.register(Box::new(stream_bytes_total.clone()))?;
        registry.register(Box::new(frames_delivered_total.clone()))?;
        registry.register(Box::new(frames_dropped_busy_total.clone()))?;
        registry.register(Box::new(frames_oversized_total.clone()))?;
        registry.register(Box::new(stream_reconnects_total.clone()))?;
        registry.register(Box::new(stream_connected.clone()))?;
        registry.register(Box::new(snapshots_succeeded_total.clone()))?;
        registry.register(Box::new(snapshots_failed_total.clone()))?;
        registry.register(Box::new(timelapse_photos_total.clone()))?;
        registry.register(Box::new(timelapse_failures_total.clone()))?;
        registry.register(Box::new(timelapse_active.clone()))?;
        registry.register(Box::new(camera_preview.clone()))?;
        registry.register(Box::new(restore_pending.clone()))?;

        Ok(Self {
            registry,
            stream_bytes_total,
            frames_delivered_total,
            frames_dropped_busy_total,
            frames_oversized_total,
            stream_reconnects_total,
            stream_connected,
            snapshots_succeeded_total,
            snapshots_failed_total,
            timelapse_photos_total,
            timelapse_failures_total,
            timelapse_active,
            camera_preview,
            restore_pending,
        })
    }

    /// Updates all metrics from a snapshot of controller state.
    ///
    /// Counters only move forward; a snapshot lower than the current value
    /// leaves the counter alone.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.stream_bytes_total, snapshot.stream_bytes);
        advance(&self.frames_delivered_total, snapshot.frames_delivered);
        advance(&self.frames_dropped_busy_total, snapshot.frames_dropped_busy);
        advance(&self.frames_oversized_total, snapshot.frames_oversized);
        advance(&self.stream_reconnects_total, snapshot.stream_reconnects);
        self.stream_connected.set(i64::from(snapshot.stream_connected));

        advance(&self.snapshots_succeeded_total, snapshot.snapshots_succeeded);
        advance(&self.snapshots_failed_total, snapshot.snapshots_failed);
        advance(&self.timelapse_photos_total, snapshot.timelapse_photos);
        advance(&self.timelapse_failures_total, snapshot.timelapse_failures);
        self.timelapse_active.set(i64::from(snapshot.timelapse_active));

        self.camera_preview.set(i64::from(snapshot.camera_preview));
        self.restore_pending.set(i64::from(snapshot.restore_pending));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Gathers a snapshot from the controller's components.
    pub fn from_components(
        demux: DemuxStats,
        stream_reconnects: u64,
        stream_connected: bool,
        snapshot: &SnapshotCapture,
        timelapse: &TimelapseScheduler,
        mode: &CameraModeState,
    ) -> Self {
        Self {
            stream_bytes: demux.bytes_consumed,
            frames_delivered: demux.frames_delivered,
            frames_dropped_busy: demux.frames_dropped_busy,
            frames_oversized: demux.frames_oversized,
            stream_reconnects,
            stream_connected,
            snapshots_succeeded: snapshot.successes(),
            snapshots_failed: snapshot.failures(),
            timelapse_photos: timelapse.total_photos(),
            timelapse_failures: timelapse.total_failures(),
            timelapse_active: timelapse.is_active(),
            camera_preview: mode.is_preview(),
            restore_pending: mode.restore_pending(),
        }
    }
}
