use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use hwrk_core::{ResponseHead, estimate_header_bytes};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// What to do with a 3xx response that carries a `Location` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Fail the request with [`crate::Error::RedirectRefused`].
    #[default]
    Refuse,
    /// Follow up to `max` hops.
    Follow { max: usize },
    /// Hand the 3xx response back as is.
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientOptions {
    /// Budget for a whole exchange, redirects and body read included.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub redirects: RedirectPolicy,
    pub keep_alive: bool,
    pub compression: bool,
    pub insecure: bool,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
    pub http2: bool,
    /// Plain `http://` forward proxy; HTTPS targets are tunneled with `CONNECT`.
    pub proxy: Option<url::Url>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be tens of seconds; keep failed connects prompt.
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            redirects: RedirectPolicy::Refuse,
            keep_alive: true,
            compression: true,
            insecure: false,
            client_cert: None,
            client_key: None,
            ca_cert: None,
            http2: false,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// What the load engine classifies.
    pub fn head(&self) -> ResponseHead {
        ResponseHead {
            status: self.status,
            content_length: self.content_length(),
            body_bytes: self.body.len() as u64,
            header_bytes: estimate_header_bytes(&self.headers),
        }
    }
}
