//! Session and photo numbering.
//!
//! Numbers are recovered from what is already on storage, so a session
//! survives restarts without any index file.

use crate::storage::EntryName;

const PHOTO_PREFIX: &str = "IMG_";
const PHOTO_SUFFIX: &str = ".jpg";

/// Id for a new session: one past the largest numeric subdirectory, or 0.
///
/// Files and non-numeric directory names are ignored.
pub fn next_session_id(entries: &[EntryName]) -> u32 {
    entries
        .iter()
        .filter(|entry| entry.is_dir)
        .filter_map(|entry| entry.name.parse::<u32>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// `IMG_<session>_<seq>.jpg` with the sequence zero-padded to four digits.
pub fn photo_file_name(session_id: u32, sequence: u32) -> String {
    format!("{PHOTO_PREFIX}{session_id}_{sequence:04}{PHOTO_SUFFIX}")
}

/// Sequence number of a photo file name, taken after the second
/// underscore.
pub fn parse_photo_sequence(name: &str) -> Option<u32> {
    let stem = name.strip_prefix(PHOTO_PREFIX)?.strip_suffix(PHOTO_SUFFIX)?;
    let (_, sequence) = stem.split_once('_')?;
    sequence.parse().ok()
}

/// Sequence for the next photo: one past the largest existing, or 0.
pub fn next_photo_sequence(entries: &[EntryName]) -> u32 {
    entries
        .iter()
        .filter(|entry| !entry.is_dir)
        .filter_map(|entry| parse_photo_sequence(&entry.name))
        .max()
        .map_or(0, |max| max.saturating_add(1))
}
