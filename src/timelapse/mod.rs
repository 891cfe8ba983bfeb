//! Unattended interval capture.
//!
//! Each session gets its own numbered directory under the timelapse root
//! and photos named `IMG_<session>_<seq>.jpg`. Numbers are derived from
//! the directory listing, so an interrupted session never overwrites
//! earlier work.

mod naming;
mod scheduler;

pub use naming::{next_photo_sequence, next_session_id, parse_photo_sequence, photo_file_name};
pub use scheduler::{
    StopSummary, TickOutcome, TimelapseScheduler, TimelapseSession, TimelapseSettings,
    TimelapseStatus, UserInput, DEFAULT_INTERVAL, DEFAULT_SCREEN_OFF_TIMEOUT,
};
