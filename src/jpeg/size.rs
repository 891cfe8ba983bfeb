//! Image dimensions from the start-of-frame header.

use super::{MARKER_PREFIX, SOF0, SOF2};
use serde::{Deserialize, Serialize};

/// Bytes needed from the marker start: marker (2), segment length (2),
/// precision (1), height (2), width (2).
const SOF_HEADER_LEN: usize = 9;

/// Width and height read from a JPEG header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
}

/// Size parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    /// The data holds no readable SOF0 or SOF2 header.
    #[error("no complete start-of-frame header found")]
    NotFound,
}

/// Scans `data` for the first SOF0/SOF2 marker and reads the frame size.
///
/// Height comes first in the header, then width, both big-endian.
pub fn parse_frame_size(data: &[u8]) -> Result<FrameSize, SizeError> {
    let pos = data
        .windows(2)
        .position(|w| w[0] == MARKER_PREFIX && (w[1] == SOF0 || w[1] == SOF2))
        .ok_or(SizeError::NotFound)?;

    let header = data
        .get(pos..pos + SOF_HEADER_LEN)
        .ok_or(SizeError::NotFound)?;

    Ok(FrameSize {
        height: u16::from_be_bytes([header[5], header[6]]),
        width: u16::from_be_bytes([header[7], header[8]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_height_then_width() {
        let data = [
            0xFF, 0xD8, 0x12, 0x34, // junk before the header
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x90, 0x01, 0x40, 0x03,
        ];
        let size = parse_frame_size(&data).unwrap();
        assert_eq!(size.height, 144);
        assert_eq!(size.width, 320);
    }

    #[test]
    fn test_progressive_marker() {
        let data = [0xFF, 0xC2, 0x00, 0x11, 0x08, 0x02, 0xD0, 0x05, 0x00];
        let size = parse_frame_size(&data).unwrap();
        assert_eq!(size, FrameSize { width: 1280, height: 720 });
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            parse_frame_size(&[0xFF, 0xD8, 0xFF, 0xD9]),
            Err(SizeError::NotFound)
        );
        assert_eq!(parse_frame_size(&[]), Err(SizeError::NotFound));
    }

    #[test]
    fn test_header_cut_short() {
        // Marker found but only 8 bytes from its start
        let data = [0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x90, 0x01];
        assert_eq!(parse_frame_size(&data), Err(SizeError::NotFound));
    }

    #[test]
    fn test_first_marker_wins() {
        let data = [
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x10, 0x00, 0x20, //
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x90, 0x01, 0x40,
        ];
        let size = parse_frame_size(&data).unwrap();
        assert_eq!(size, FrameSize { width: 32, height: 16 });
    }
}
