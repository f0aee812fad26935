use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hwrk_core::OutboundRequest;
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::options::{HttpClientOptions, HttpResponse, RedirectPolicy};
use super::proxy::{ProxyConnector, proxy_uri};
use super::tls::client_config;
use super::util::{has_header, is_redirect, parse_target, redirect_method, resolve_location};
use super::{Error, Result};

/// Shared HTTP/1.1 (and optionally h2) client. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<ProxyConnector>, Full<Bytes>>,
    options: HttpClientOptions,
}

impl HttpClient {
    /// Fails on TLS material that can't be loaded or an unusable proxy; nothing is sent yet.
    pub fn new(options: HttpClientOptions) -> Result<Self> {
        let tls = client_config(&options)?;
        let proxy = options.proxy.as_ref().map(proxy_uri).transpose()?;

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(options.connect_timeout);
        let connector = ProxyConnector::new(http_connector, proxy);

        let builder = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1();
        let https_connector = if options.http2 {
            builder.enable_http2().wrap_connector(connector)
        } else {
            builder.wrap_connector(connector)
        };

        let mut client = Client::builder(TokioExecutor::new());
        if !options.keep_alive {
            client.pool_max_idle_per_host(0);
        }
        let inner = client.build(https_connector);

        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }

    /// Sends `req`, applies the redirect policy and reads the final body.
    pub async fn request(&self, req: &OutboundRequest) -> Result<HttpResponse> {
        match self.options.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.exchange(req)).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => self.exchange(req).await,
        }
    }

    async fn exchange(&self, req: &OutboundRequest) -> Result<HttpResponse> {
        let mut target = parse_target(&req.url)?;
        let mut method = req.method.clone();
        let mut body = req.body.clone();
        let mut hops = 0usize;

        loop {
            let res = self.send_once(req, &method, &target, body.clone(), hops == 0).await?;
            let status = res.status();

            let location = is_redirect(status)
                .then(|| res.headers().get(http::header::LOCATION))
                .flatten()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

            let Some(location) = location else {
                return read_response(res).await;
            };

            match self.options.redirects {
                RedirectPolicy::Accept => return read_response(res).await,
                RedirectPolicy::Refuse => {
                    return Err(Error::RedirectRefused {
                        status: status.as_u16(),
                        location,
                    });
                }
                RedirectPolicy::Follow { max } => {
                    if hops >= max {
                        return Err(Error::TooManyRedirects(max));
                    }
                    hops += 1;

                    // Drain so the connection can go back to the pool.
                    let _ = res.into_body().collect().await;

                    target = resolve_location(&target, &location)?;
                    if let Some(next) = redirect_method(status, &method) {
                        method = next;
                        body = Bytes::new();
                    }
                    tracing::trace!(hop = hops, %target, "following redirect");
                }
            }
        }
    }

    async fn send_once(
        &self,
        req: &OutboundRequest,
        method: &http::Method,
        target: &url::Url,
        body: Bytes,
        first_hop: bool,
    ) -> Result<hyper::Response<Incoming>> {
        let uri: hyper::Uri = target
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidUrl(target.to_string()))?;

        let mut builder = Request::builder().method(method.clone()).uri(uri);

        for (k, v) in &req.headers {
            let name = http::header::HeaderName::from_bytes(k.as_bytes())?;
            let value = http::header::HeaderValue::from_str(v)?;
            builder = builder.header(name, value);
        }

        // The override only applies to the host the user pointed us at.
        if first_hop && let Some(host) = &req.host {
            let host = http::header::HeaderValue::from_str(host)?;
            builder = builder.header(http::header::HOST, host);
        }
        if self.options.compression && !has_header(&req.headers, "accept-encoding") {
            builder = builder.header(http::header::ACCEPT_ENCODING, "gzip");
        }
        if !self.options.keep_alive
            && !self.options.http2
            && !has_header(&req.headers, "connection")
        {
            builder = builder.header(http::header::CONNECTION, "close");
        }

        let request: Request<Full<Bytes>> = builder.body(Full::new(body))?;
        Ok(self.inner.request(request).await?)
    }
}

async fn read_response(res: hyper::Response<Incoming>) -> Result<HttpResponse> {
    let (parts, body) = res.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(HttpResponse {
        status: parts.status.as_u16(),
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn unreachable_host_fails_fast_with_connect_timeout() {
        // Use a small timeout to keep the test fast and deterministic.
        let client = match HttpClient::new(HttpClientOptions {
            timeout: None,
            connect_timeout: Some(Duration::from_millis(200)),
            ..HttpClientOptions::default()
        }) {
            Ok(c) => c,
            Err(err) => panic!("failed to build client: {err}"),
        };
        let req = hwrk_core::RequestTemplate::get("http://192.0.2.1:81/").build();

        let started = Instant::now();
        let res = client.request(&req).await;
        let elapsed = started.elapsed();

        assert!(res.is_err());
        // Assert we didn't block for an OS-level TCP connect timeout.
        assert!(
            elapsed < Duration::from_secs(2),
            "expected fast failure, elapsed={elapsed:?}"
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_before_connecting() {
        let client = match HttpClient::new(HttpClientOptions::default()) {
            Ok(c) => c,
            Err(err) => panic!("failed to build client: {err}"),
        };
        let req = hwrk_core::RequestTemplate::get("ws://localhost/").build();
        assert!(matches!(
            client.request(&req).await,
            Err(Error::UnsupportedScheme(_))
        ));
    }
}
