//! Live feed demultiplexing.
//!
//! The remote camera's `/stream` endpoint returns raw JPEG frames back to
//! back with no multipart boundaries. [`StreamDemux`] cuts that byte stream
//! into whole frames and hands each one to a single-entry [`FrameSlot`].
//! Memory use is fixed at startup: one scratch buffer inside the demux and
//! one buffer in the slot, both of the configured frame capacity.

mod buffer;
mod demux;
mod slot;

pub use buffer::{BufferFull, FixedBuffer};
pub use demux::{DemuxState, DemuxStats, PollOutcome, StreamDemux};
pub use slot::FrameSlot;

/// Default upper bound on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 70 * 1024;

/// Default number of bytes consumed per demux call.
pub const DEFAULT_BYTES_PER_POLL: usize = 2048;
