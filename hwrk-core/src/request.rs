use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;

use crate::sender::OutboundRequest;

pub const USER_AGENT: &str = concat!("hwrk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Static(Bytes),
    /// One of these is picked at random when a worker starts.
    Pool(Arc<[Bytes]>),
}

impl RequestBody {
    #[must_use]
    pub fn pick(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Static(b) => b.clone(),
            Self::Pool(pool) => match pool.len() {
                0 => Bytes::new(),
                1 => pool[0].clone(),
                n => pool[rand::rng().random_range(0..n)].clone(),
            },
        }
    }
}

/// Everything a worker needs to build its requests; shared read-only by all workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub host: Option<String>,
    pub body: RequestBody,
}

impl RequestTemplate {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: http::Method::GET,
            url: url.into(),
            headers: Vec::new(),
            host: None,
            body: RequestBody::Empty,
        }
    }

    /// Builds the request a worker will send for the rest of the run.
    ///
    /// Adds `User-Agent` unless the caller provided one.
    #[must_use]
    pub fn build(&self) -> OutboundRequest {
        let mut headers = self.headers.clone();
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(http::header::USER_AGENT.as_str()))
        {
            headers.push((
                http::header::USER_AGENT.as_str().to_string(),
                USER_AGENT.to_string(),
            ));
        }

        OutboundRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            host: self.host.clone(),
            body: self.body.pick(),
        }
    }
}

/// Form-encodes the value of every `key=value` pair in the query string.
///
/// Parts that are not exactly one `key=value` pair are left as they are.
#[must_use]
pub fn escape_query_values(raw: &str) -> String {
    let Some((base, query)) = raw.split_once('?') else {
        return raw.to_string();
    };

    let escaped = query
        .split('&')
        .map(|part| {
            let mut pieces = part.split('=');
            match (pieces.next(), pieces.next(), pieces.next()) {
                (Some(key), Some(value), None) => {
                    let value: String =
                        url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
                    format!("{key}={value}")
                }
                _ => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{base}?{escaped}")
}
