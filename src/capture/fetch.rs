//! Request and body handling shared by snapshot and timelapse capture.

use super::error::{CaptureError, ProtocolError};
use crate::camera::{CameraLink, CameraTransport, HttpResponse, LinkError, TransportError, CAPTURE_PATH};
use crate::storage::StorageError;
use crate::stream::FixedBuffer;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Chunk size used when streaming a body to storage.
pub(crate) const COPY_CHUNK: usize = 1024;

/// Sleeps for `delay` unless it is zero.
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Issues the trigger GET, discards it, then returns the validated second
/// response.
///
/// The camera buffers a frame taken before the mode switch; the first
/// request flushes it. Its status is not inspected.
pub(crate) fn fetch_photo<T: CameraTransport>(
    link: &mut CameraLink<T>,
    settle_delay: Duration,
    max_content_length: u64,
) -> Result<HttpResponse<T::Body>, CaptureError> {
    let trigger = link.get(CAPTURE_PATH)?;
    tracing::debug!(status = trigger.status, "Discarding trigger response");
    drop(trigger);

    settle(settle_delay);

    let response = link.get(CAPTURE_PATH)?;
    validate(&response, max_content_length)?;
    Ok(response)
}

/// Checks status, content type and declared length before any body byte
/// is read.
pub(crate) fn validate<B>(response: &HttpResponse<B>, max_content_length: u64) -> Result<(), CaptureError> {
    if !response.is_ok() {
        return Err(LinkError::Status {
            path: CAPTURE_PATH.to_string(),
            status: response.status,
        }
        .into());
    }

    let content_type = response.content_type();
    if !content_type.is_empty() && !content_type.starts_with("image/jpeg") {
        return Err(ProtocolError::UnexpectedContentType(content_type.to_string()).into());
    }

    if let Some(declared) = response.content_length {
        if declared > max_content_length {
            return Err(ProtocolError::ContentTooLarge {
                declared,
                limit: max_content_length,
            }
            .into());
        }
    }
    Ok(())
}

fn read_error(e: io::Error) -> CaptureError {
    LinkError::from(TransportError::from(e)).into()
}

/// Reads a body into `buffer` until end of stream or the declared length.
///
/// Filling the buffer completely counts as truncation: the photo did not
/// fit.
pub(crate) fn read_bounded<R: Read>(
    body: &mut R,
    declared: Option<u64>,
    buffer: &mut FixedBuffer,
) -> Result<(), CaptureError> {
    buffer.clear();
    loop {
        if buffer.is_full() {
            return Err(ProtocolError::Truncated {
                received: buffer.len() as u64,
            }
            .into());
        }

        let want = match declared {
            Some(total) => {
                let left = total.saturating_sub(buffer.len() as u64);
                if left == 0 {
                    return Ok(());
                }
                usize::try_from(left).unwrap_or(usize::MAX).min(buffer.remaining())
            }
            None => buffer.remaining(),
        };

        match body.read(&mut buffer.spare_mut()[..want]) {
            Ok(0) => return Ok(()),
            Ok(n) => buffer.commit(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        }
    }
}

/// Streams a body into `writer` in [`COPY_CHUNK`] pieces.
///
/// Never writes more than `max_bytes`; a body that is longer, or shorter
/// than its declared length, is reported as truncated. Returns the number
/// of bytes written.
pub(crate) fn copy_bounded<R: Read, W: Write>(
    body: &mut R,
    declared: Option<u64>,
    max_bytes: u64,
    writer: &mut W,
    path: &Path,
) -> Result<u64, CaptureError> {
    let write_error = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut chunk = [0u8; COPY_CHUNK];
    let mut written: u64 = 0;

    loop {
        if declared.map_or(false, |total| written >= total) {
            break;
        }

        let n = match body.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        };

        if written + n as u64 > max_bytes {
            return Err(ProtocolError::Truncated { received: written }.into());
        }
        writer.write_all(&chunk[..n]).map_err(write_error)?;
        written += n as u64;
    }

    writer.flush().map_err(write_error)?;

    match declared {
        Some(total) if written < total => Err(ProtocolError::Truncated { received: written }.into()),
        _ => Ok(written),
    }
}
