use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower_service::Service;

use super::{Error, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Connecting = Pin<Box<dyn Future<Output = std::result::Result<ProxyStream, BoxError>> + Send>>;

/// Checks a proxy URL and turns it into the URI the connector dials.
pub(crate) fn proxy_uri(proxy: &url::Url) -> Result<Uri> {
    if proxy.scheme() != "http" {
        return Err(Error::InvalidProxy(format!(
            "{proxy}: unsupported scheme '{}' (expected http)",
            proxy.scheme()
        )));
    }
    if !proxy.username().is_empty() || proxy.password().is_some() {
        return Err(Error::InvalidProxy(format!(
            "{}:{}: credentials are not supported",
            proxy.host_str().unwrap_or_default(),
            proxy.port_or_known_default().unwrap_or_default()
        )));
    }
    if proxy.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidProxy(format!("{proxy}: missing host")));
    }
    proxy
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidProxy(proxy.to_string()))
}

/// Dials targets directly, or through an HTTP proxy when one is configured.
///
/// `http://` targets are sent to the proxy itself, which makes the client write
/// absolute-form request lines. `https://` targets get a `CONNECT` tunnel so TLS
/// still runs end to end with the origin.
#[derive(Debug, Clone)]
pub(crate) struct ProxyConnector {
    http: HttpConnector,
    proxy: Option<Uri>,
}

impl ProxyConnector {
    pub(crate) fn new(http: HttpConnector, proxy: Option<Uri>) -> Self {
        Self { http, proxy }
    }
}

impl Service<Uri> for ProxyConnector {
    type Response = ProxyStream;
    type Error = BoxError;
    type Future = Connecting;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let mut connector = self.http.clone();
        let proxy = self.proxy.clone();

        Box::pin(async move {
            let Some(proxy) = proxy else {
                let io = connector.call(dst).await?;
                return Ok(ProxyStream::new(io, false));
            };

            if dst.scheme() == Some(&http::uri::Scheme::HTTPS) {
                tracing::trace!(%dst, %proxy, "opening proxy tunnel");
                let mut tunnel = Tunnel::new(proxy, connector);
                std::future::poll_fn(|cx| tunnel.poll_ready(cx)).await?;
                let io = tunnel.call(dst).await?;
                Ok(ProxyStream::new(io, false))
            } else {
                let io = connector.call(proxy).await?;
                Ok(ProxyStream::new(io, true))
            }
        })
    }
}

/// A connection that remembers whether requests on it go to a forwarding proxy.
pub(crate) struct ProxyStream {
    inner: TokioIo<TcpStream>,
    forwarding: bool,
}

impl ProxyStream {
    fn new(inner: TokioIo<TcpStream>, forwarding: bool) -> Self {
        Self { inner, forwarding }
    }
}

impl Connection for ProxyStream {
    fn connected(&self) -> Connected {
        self.inner.connected().proxy(self.forwarding)
    }
}

impl Read for ProxyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Write for ProxyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }
}
