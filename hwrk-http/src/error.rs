use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    RequestBuild,
    HeaderName,
    HeaderValue,
    Request,
    Timeout,
    BodyRead,
    RedirectRefused,
    TooManyRedirects,
    InvalidRedirect,
    Tls,
    InvalidProxy,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// URLs are supported: {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid http header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid http header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),

    #[error("redirect ({status}) to {location} not allowed")]
    RedirectRefused { status: u16, location: String },

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    #[error("invalid redirect location: {0}")]
    InvalidRedirect(String),

    #[error("tls configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("failed to load {}: {message}", path.display())]
    Pem { path: PathBuf, message: String },

    #[error("{0} requires {1}")]
    IncompleteClientAuth(&'static str, &'static str),

    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_) => HttpTransportErrorKind::InvalidUrl,
            Self::UnsupportedScheme(_) => HttpTransportErrorKind::UnsupportedScheme,
            Self::RequestBuild(_) => HttpTransportErrorKind::RequestBuild,
            Self::HeaderName(_) => HttpTransportErrorKind::HeaderName,
            Self::HeaderValue(_) => HttpTransportErrorKind::HeaderValue,
            Self::Request(_) => HttpTransportErrorKind::Request,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::BodyRead(_) => HttpTransportErrorKind::BodyRead,
            Self::RedirectRefused { .. } => HttpTransportErrorKind::RedirectRefused,
            Self::TooManyRedirects(_) => HttpTransportErrorKind::TooManyRedirects,
            Self::InvalidRedirect(_) => HttpTransportErrorKind::InvalidRedirect,
            Self::Tls(_) | Self::Pem { .. } | Self::IncompleteClientAuth(..) => {
                HttpTransportErrorKind::Tls
            }
            Self::InvalidProxy(_) => HttpTransportErrorKind::InvalidProxy,
        }
    }

    /// The error message followed by every underlying cause, `: `-separated.
    ///
    /// hyper's top-level errors are terse ("client error (Connect)"); the causes carry
    /// the part worth tallying, e.g. "tcp connect error: Connection refused".
    #[must_use]
    pub fn detailed_message(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let msg = err.to_string();
            if !out.ends_with(&msg) {
                out.push_str(": ");
                out.push_str(&msg);
            }
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_snake_case() {
        let err = Error::RedirectRefused {
            status: 301,
            location: "/next".to_string(),
        };
        assert_eq!(err.transport_error_kind().to_string(), "redirect_refused");
        assert_eq!(err.to_string(), "redirect (301) to /next not allowed");
        assert_eq!(
            Error::Timeout(Duration::from_secs(1))
                .transport_error_kind()
                .to_string(),
            "timeout"
        );
    }

    #[test]
    fn detailed_message_without_source_is_display() {
        let err = Error::TooManyRedirects(10);
        assert_eq!(err.detailed_message(), "stopped after 10 redirects");
    }
}
