//! Scripted transport for tests and offline demos.

use super::transport::{CameraTransport, HttpResponse, TransportError};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A response with the given head and body.
    Response {
        /// HTTP status code.
        status: u16,
        /// `Content-Type` header.
        content_type: Option<String>,
        /// `Content-Length` header.
        content_length: Option<u64>,
        /// Body bytes.
        body: Vec<u8>,
    },
    /// HTTP 200 stream that sends `body` and then goes silent: every later
    /// read times out instead of reaching end of stream.
    Stall(Vec<u8>),
    /// The connection could not be established.
    ConnectFailure,
    /// The request timed out.
    Timeout,
}

impl MockReply {
    /// Empty-bodied response with `status`.
    pub fn status(status: u16) -> Self {
        MockReply::Response {
            status,
            content_type: None,
            content_length: Some(0),
            body: Vec::new(),
        }
    }

    /// Empty HTTP 200.
    pub fn ok() -> Self {
        Self::status(200)
    }

    /// HTTP 200 carrying a JPEG body with matching headers.
    pub fn jpeg(body: Vec<u8>) -> Self {
        MockReply::Response {
            status: 200,
            content_type: Some("image/jpeg".to_string()),
            content_length: Some(body.len() as u64),
            body,
        }
    }

    /// HTTP 200 with an untyped body and no length header, like a stream.
    pub fn raw(body: Vec<u8>) -> Self {
        MockReply::Response {
            status: 200,
            content_type: None,
            content_length: None,
            body,
        }
    }

    /// Replaces the content type header.
    pub fn with_content_type(mut self, value: Option<&str>) -> Self {
        if let MockReply::Response { content_type, .. } = &mut self {
            *content_type = value.map(str::to_string);
        }
        self
    }

    /// Replaces the content length header.
    pub fn with_content_length(mut self, value: Option<u64>) -> Self {
        if let MockReply::Response { content_length, .. } = &mut self {
            *content_length = value;
        }
        self
    }
}

/// Transport answering from per-path queues, then per-prefix defaults.
///
/// A fresh mock acknowledges every `/control` request and serves an empty
/// `/stream`; everything else is a 404 until scripted.
#[derive(Debug)]
pub struct MockTransport {
    queued: HashMap<String, VecDeque<MockReply>>,
    defaults: Vec<(String, MockReply)>,
    requests: Vec<String>,
}

impl MockTransport {
    /// Creates a mock with the default control and stream answers.
    pub fn new() -> Self {
        Self {
            queued: HashMap::new(),
            defaults: vec![
                ("/control".to_string(), MockReply::ok()),
                ("/stream".to_string(), MockReply::raw(Vec::new())),
            ],
            requests: Vec::new(),
        }
    }

    /// Queues a one-shot answer for the exact `path`.
    pub fn push(&mut self, path: &str, reply: MockReply) -> &mut Self {
        self.queued
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Sets the answer for every path starting with `prefix` once its queue
    /// is empty. The longest matching prefix wins.
    pub fn set_default(&mut self, prefix: &str, reply: MockReply) -> &mut Self {
        self.defaults.retain(|(p, _)| p != prefix);
        self.defaults.push((prefix.to_string(), reply));
        self
    }

    /// Every path requested so far, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    /// Number of requests whose path starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.requests.iter().filter(|p| p.starts_with(prefix)).count()
    }

    /// Forgets the request log.
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    fn next_reply(&mut self, path: &str) -> MockReply {
        if let Some(reply) = self.queued.get_mut(path).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.defaults
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| MockReply::status(404))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripted response body.
#[derive(Debug)]
pub struct MockBody {
    data: Cursor<Vec<u8>>,
    stalls: bool,
}

impl MockBody {
    fn new(body: Vec<u8>, stalls: bool) -> Self {
        Self {
            data: Cursor::new(body),
            stalls,
        }
    }
}

impl Read for MockBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 if self.stalls && !buf.is_empty() => Err(io::ErrorKind::TimedOut.into()),
            n => Ok(n),
        }
    }
}

impl CameraTransport for MockTransport {
    type Body = MockBody;

    fn get(&mut self, path: &str) -> Result<HttpResponse<Self::Body>, TransportError> {
        self.requests.push(path.to_string());

        match self.next_reply(path) {
            MockReply::Response {
                status,
                content_type,
                content_length,
                body,
            } => Ok(HttpResponse {
                status,
                content_type,
                content_length,
                body: MockBody::new(body, false),
            }),
            MockReply::Stall(body) => Ok(HttpResponse {
                status: 200,
                content_type: None,
                content_length: None,
                body: MockBody::new(body, true),
            }),
            MockReply::ConnectFailure => {
                Err(TransportError::Connect("mock connection refused".to_string()))
            }
            MockReply::Timeout => Err(TransportError::Timeout),
        }
    }
}
