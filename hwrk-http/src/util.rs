use http::StatusCode;

use crate::{Error, Result};

pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn parse_target(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::UnsupportedScheme(raw.to_string()));
    }
    Ok(parsed)
}

/// Statuses that are subject to the redirect policy when they carry a `Location`.
pub(super) fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// 301/302/303 turn a non-GET/HEAD request into a bodyless GET; 307/308 replay it.
pub(super) fn redirect_method(status: StatusCode, method: &http::Method) -> Option<http::Method> {
    let rewrites = matches!(status.as_u16(), 301..=303);
    (rewrites && method != http::Method::GET && method != http::Method::HEAD)
        .then_some(http::Method::GET)
}

pub(super) fn resolve_location(base: &url::Url, location: &str) -> Result<url::Url> {
    let next = base
        .join(location)
        .map_err(|_| Error::InvalidRedirect(location.to_string()))?;
    if next.scheme() != "http" && next.scheme() != "https" {
        return Err(Error::InvalidRedirect(location.to_string()));
    }
    Ok(next)
}
