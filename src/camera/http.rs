//! Blocking HTTP transport backed by `reqwest`.

use super::transport::{CameraTransport, HttpResponse, TransportError};
use super::STREAM_PATH;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::io::{self, Read};
use std::time::Duration;

/// Talks to the camera over plain HTTP.
///
/// Two clients are kept: one for control and capture requests, and one for
/// the unbounded live stream. The blocking client applies its timeout to
/// every wait, so the stream client's short timeout bounds each body read
/// rather than the life of the feed.
pub struct ReqwestTransport {
    base_url: String,
    user_agent: String,
    requests: Client,
    stream: Client,
}

impl ReqwestTransport {
    /// Builds clients for `base_url`, e.g. `http://192.168.4.1/api/v1`.
    ///
    /// `timeout` bounds control and capture requests. `stream_read_timeout`
    /// bounds opening the live feed and each read from it; a read that
    /// times out fails with [`io::ErrorKind::TimedOut`].
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
        stream_read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let requests = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let stream = Client::builder()
            .timeout(stream_read_timeout)
            .connect_timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            requests,
            stream,
        })
    }

    /// Camera API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CameraTransport for ReqwestTransport {
    type Body = ResponseBody;

    fn get(&mut self, path: &str) -> Result<HttpResponse<Self::Body>, TransportError> {
        let client = if path.starts_with(STREAM_PATH) {
            &self.stream
        } else {
            &self.requests
        };
        let url = format!("{}{}", self.base_url, path);

        let response = client
            .get(&url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(HttpResponse {
            status: response.status().as_u16(),
            content_type,
            content_length: response.content_length(),
            body: ResponseBody(response),
        })
    }
}

/// Response body whose timed-out reads report [`io::ErrorKind::TimedOut`].
///
/// reqwest surfaces an expired read deadline as an opaque `Other` error.
pub struct ResponseBody(Response);

fn is_reqwest_timeout(e: &io::Error) -> bool {
    e.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .map_or(false, reqwest::Error::is_timeout)
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            if e.kind() != io::ErrorKind::TimedOut && is_reqwest_timeout(&e) {
                io::Error::new(io::ErrorKind::TimedOut, e)
            } else {
                e
            }
        })
    }
}
