//! HTTP transport capability.

use std::io::Read;
use thiserror::Error;

/// Errors raised by the transport before a response is available.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The camera could not be reached.
    #[error("failed to connect to camera: {0}")]
    Connect(String),
    /// No response head arrived in time.
    #[error("request timed out")]
    Timeout,
    /// Local I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other request failure.
    #[error("request failed: {0}")]
    Request(String),
}

/// Response head plus a streaming body.
pub struct HttpResponse<B> {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// `Content-Length` header, if sent.
    pub content_length: Option<u64>,
    /// Unread response body.
    pub body: B,
}

impl<B> HttpResponse<B> {
    /// Returns true for HTTP 200.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Content type, or the empty string when the header was absent.
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("")
    }
}

impl<B> std::fmt::Debug for HttpResponse<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Issues GET requests against the camera's API root.
///
/// `path` is relative to the camera base URL and may carry a query string.
/// Implementations must return as soon as the response head is available;
/// the body is read by the caller.
pub trait CameraTransport {
    /// Streaming body type.
    type Body: Read;

    /// Performs a GET request.
    fn get(&mut self, path: &str) -> Result<HttpResponse<Self::Body>, TransportError>;
}
