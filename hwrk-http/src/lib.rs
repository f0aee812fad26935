#![forbid(unsafe_code)]

mod client;
mod error;
mod options;
mod proxy;
mod sender;
mod tls;
mod util;

pub use client::HttpClient;
pub use error::{Error, HttpTransportErrorKind, Result};
pub use options::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, HttpClientOptions,
    HttpResponse, RedirectPolicy,
};
