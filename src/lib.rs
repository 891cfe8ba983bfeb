//! Camera Feed Controller Library
//!
//! Drives a remote HTTP camera from a constrained device: a low-latency
//! live preview, one-shot high resolution snapshots, and unattended
//! timelapse sessions written to removable storage.
//!
//! # Architecture
//!
//! ```text
//!             ┌──────────── controller ────────────┐
//!             ↓                ↓                   ↓
//! camera ──→ stream ──→ display        capture / timelapse ──→ storage
//!             ↓                                    ↓
//!           jpeg (frame size, trim)              jpeg
//! ```
//!
//! # Design Principles
//!
//! - **Fixed memory**: frames live in buffers allocated once at startup
//! - **Bounded passes**: every control-loop pass does a bounded amount of work
//! - **One camera owner**: the live feed is stopped before any capture request
//! - **Failures are values**: nothing a camera or card does crashes the loop
//!
//! # Example
//!
//! ```no_run
//! use camfeed::{
//!     camera::{CameraLink, CameraProfiles, MockTransport},
//!     controller::{ControlInput, Controller, ControllerSettings},
//!     display::NullDisplay,
//!     storage::MemoryStorage,
//! };
//! use std::time::Instant;
//!
//! let link = CameraLink::new(MockTransport::new(), CameraProfiles::default());
//! let mut controller = Controller::new(
//!     link,
//!     MemoryStorage::new(),
//!     NullDisplay,
//!     ControllerSettings::default(),
//! );
//!
//! for _ in 0..10 {
//!     controller.poll(Instant::now(), ControlInput::None);
//! }
//! controller.poll(Instant::now(), ControlInput::Snapshot);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod camera;
pub mod capture;
pub mod config;
pub mod controller;
pub mod display;
pub mod jpeg;
pub mod metrics;
pub mod storage;
pub mod stream;
pub mod timelapse;

// Re-export commonly used types at crate root
pub use camera::{CameraLink, CameraMode, CameraProfiles, CameraTransport, MockTransport};
pub use capture::{CaptureError, CaptureResult, SnapshotCapture};
pub use config::FileConfig;
pub use controller::{ControlEvent, ControlInput, Controller, ControllerSettings};
pub use jpeg::{parse_frame_size, trim_to_eoi, FrameSize};
pub use stream::{FrameSlot, StreamDemux};
pub use timelapse::{TimelapseScheduler, UserInput};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
