//! Prometheus metrics for the capture controller.
//!
//! # Metrics Exposed
//!
//! ## Live Feed Metrics
//! - `camfeed_stream_bytes_total` - Bytes consumed by the demultiplexer
//! - `camfeed_frames_delivered_total` - Frames handed to the display slot
//! - `camfeed_frames_dropped_busy_total` - Frames dropped while the slot was full
//! - `camfeed_frames_oversized_total` - Frames discarded for exceeding capacity
//! - `camfeed_stream_reconnects_total` - Live feed connections opened
//! - `camfeed_stream_connected` - Connection state (1=connected, 0=disconnected)
//!
//! ## Capture Metrics
//! - `camfeed_snapshots_succeeded_total` / `camfeed_snapshots_failed_total`
//! - `camfeed_timelapse_photos_total` / `camfeed_timelapse_failures_total`
//! - `camfeed_timelapse_active` - Session state (1=running, 0=idle)
//!
//! ## Camera Mode Metrics
//! - `camfeed_camera_preview` - Camera known to be in preview mode
//! - `camfeed_camera_restore_pending` - Camera stranded outside preview mode
//!
//! # Example
//!
//! ```no_run
//! use camfeed::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     frames_delivered: 120,
//!     stream_connected: true,
//!     camera_preview: true,
//!     ..MetricsSnapshot::default()
//! };
//!
//! registry.update(&snapshot);
//! println!("{}", registry.encode().expect("Failed to encode"));
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
