use std::future::Future;

use bytes::Bytes;

/// A fully resolved request, ready to be handed to a [`RequestSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: http::Method,
    pub url: String,
    /// Header pairs in the order they should be sent.
    pub headers: Vec<(String, String)>,
    /// Overrides the `Host` header derived from the URL.
    pub host: Option<String>,
    pub body: Bytes,
}

/// What the core needs to know about a response once its body has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    /// Value of the `Content-Length` header, if the server sent one.
    pub content_length: Option<u64>,
    /// Number of body bytes actually read.
    pub body_bytes: u64,
    /// Estimated size of the response header block, see [`crate::estimate_header_bytes`].
    pub header_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The server answered with a redirect and the transport policy refuses to follow it.
    #[error("{0}")]
    Redirected(String),

    /// Anything else: connect/DNS/TLS failures, timeouts, invalid requests, body read errors.
    #[error("{0}")]
    Transport(String),
}

pub type SendResult = Result<ResponseHead, SendError>;

/// Transport capability shared by every worker of a run.
///
/// Implementations are used concurrently from many tasks and must not rely on
/// exclusive access. Redirect handling is a transport policy, but a refused
/// redirect has to be reported as [`SendError::Redirected`] rather than
/// silently followed or folded into a generic failure.
pub trait RequestSender: Send + Sync {
    /// Sends one request and reads the whole response body.
    fn send(&self, req: &OutboundRequest) -> impl Future<Output = SendResult> + Send;
}
