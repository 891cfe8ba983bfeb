//! JPEG marker handling.
//!
//! The core never decodes entropy-coded image data. It only needs to find
//! frame boundaries (SOI/EOI) and read the image dimensions from the
//! start-of-frame header.

mod size;
mod trim;

pub use size::{parse_frame_size, FrameSize, SizeError};
pub use trim::trim_to_eoi;

/// Marker prefix byte.
pub const MARKER_PREFIX: u8 = 0xFF;
/// Second byte of the Start-Of-Image marker.
pub const SOI: u8 = 0xD8;
/// Second byte of the End-Of-Image marker.
pub const EOI: u8 = 0xD9;
/// Second byte of the baseline Start-Of-Frame marker.
pub const SOF0: u8 = 0xC0;
/// Second byte of the progressive Start-Of-Frame marker.
pub const SOF2: u8 = 0xC2;

/// Returns the offset of the first `FF <second>` pair at or after `from`.
pub(crate) fn find_marker(data: &[u8], from: usize, second: u8) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w[0] == MARKER_PREFIX && w[1] == second)
        .map(|pos| pos + from)
}
