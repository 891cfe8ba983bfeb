//! Extraction of the first complete image from a captured body.

use super::{find_marker, EOI, SOI};

/// Returns the first complete `SOI..=EOI` span in `data`.
///
/// Leading and trailing bytes outside the span are dropped. The result is
/// empty when there is no start marker or no end marker after it.
pub fn trim_to_eoi(data: &[u8]) -> &[u8] {
    let Some(start) = find_marker(data, 0, SOI) else {
        return &[];
    };
    let Some(end) = find_marker(data, start + 2, EOI) else {
        return &[];
    };
    &data[start..end + 2]
}
