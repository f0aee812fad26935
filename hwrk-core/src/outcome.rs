use std::fmt;
use std::time::Duration;

use crate::sender::{SendError, SendResult};

/// Classified result of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Success {
        response_size: u64,
        latency: Duration,
    },
    /// A 301/307 answer that is accounted as a success.
    RedirectSuccess {
        response_size: u64,
        latency: Duration,
    },
    Failure {
        kind: ErrorKind,
    },
}

impl WorkOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }
}

/// Error tally key.
///
/// Transport failures are grouped by their message text: the transport can produce
/// arbitrarily many distinct failures and identical strings land in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Transport(String),
    Redirected,
    HttpStatus(u16),
}

impl ErrorKind {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) => ErrorClass::Transport,
            Self::Redirected => ErrorClass::Redirected,
            Self::HttpStatus(_) => ErrorClass::HttpStatus,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => f.write_str(msg),
            Self::Redirected => f.write_str("redirect refused by policy"),
            Self::HttpStatus(code) => write!(f, "http status {code}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    Transport,
    Redirected,
    HttpStatus,
}

/// Classifies one exchange.
///
/// 2xx answers count the bytes actually read; 301/307 count the advertised
/// `Content-Length` instead since redirect bodies are usually not worth reading.
/// Every other status is an error.
#[must_use]
pub fn classify(result: SendResult, elapsed: Duration) -> WorkOutcome {
    let head = match result {
        Ok(head) => head,
        Err(SendError::Redirected(_)) => {
            return WorkOutcome::Failure {
                kind: ErrorKind::Redirected,
            };
        }
        Err(SendError::Transport(msg)) => {
            return WorkOutcome::Failure {
                kind: ErrorKind::Transport(msg),
            };
        }
    };

    match head.status {
        200..=299 => WorkOutcome::Success {
            response_size: head.body_bytes.saturating_add(head.header_bytes),
            latency: elapsed,
        },
        301 | 307 => WorkOutcome::RedirectSuccess {
            response_size: head
                .content_length
                .unwrap_or(0)
                .saturating_add(head.header_bytes),
            latency: elapsed,
        },
        code => WorkOutcome::Failure {
            kind: ErrorKind::HttpStatus(code),
        },
    }
}

/// Approximates the wire size of a response header block.
///
/// Every distinct header name contributes its length plus 4 (`": "` and CRLF), every
/// value contributes its length, and the blank line closing the block adds 2.
#[must_use]
pub fn estimate_header_bytes(headers: &http::HeaderMap) -> u64 {
    let mut bytes = 0u64;
    for name in headers.keys() {
        bytes = bytes.saturating_add(name.as_str().len() as u64 + 4);
        for value in headers.get_all(name) {
            bytes = bytes.saturating_add(value.len() as u64);
        }
    }
    bytes.saturating_add(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::ResponseHead;
    use http::HeaderValue;
    use http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};

    fn head(status: u16, content_length: Option<u64>, body: u64, header: u64) -> ResponseHead {
        ResponseHead {
            status,
            content_length,
            body_bytes: body,
            header_bytes: header,
        }
    }

    #[test]
    fn ok_counts_body_read_plus_headers() {
        let latency = Duration::from_millis(3);
        let out = classify(Ok(head(200, Some(10), 10, 40)), latency);
        assert_eq!(
            out,
            WorkOutcome::Success {
                response_size: 50,
                latency
            }
        );
    }

    #[test]
    fn any_2xx_is_success() {
        let out = classify(Ok(head(204, None, 0, 20)), Duration::from_millis(1));
        assert!(matches!(
            out,
            WorkOutcome::Success {
                response_size: 20,
                ..
            }
        ));
    }

    #[test]
    fn moved_permanently_uses_content_length() {
        let latency = Duration::from_micros(700);
        let out = classify(Ok(head(301, Some(0), 0, 85)), latency);
        assert_eq!(
            out,
            WorkOutcome::RedirectSuccess {
                response_size: 85,
                latency
            }
        );

        // Bytes read are ignored for redirects.
        let out = classify(Ok(head(307, Some(12), 99, 8)), latency);
        assert_eq!(
            out,
            WorkOutcome::RedirectSuccess {
                response_size: 20,
                latency
            }
        );
    }

    #[test]
    fn other_redirects_and_errors_are_status_failures() {
        for code in [302, 303, 308, 404, 500] {
            let out = classify(Ok(head(code, Some(5), 5, 10)), Duration::from_millis(1));
            assert_eq!(
                out,
                WorkOutcome::Failure {
                    kind: ErrorKind::HttpStatus(code)
                },
                "status {code}"
            );
        }
    }

    #[test]
    fn transport_errors_are_keyed_by_message() {
        let out = classify(
            Err(SendError::Transport("connection refused".to_string())),
            Duration::ZERO,
        );
        assert_eq!(
            out,
            WorkOutcome::Failure {
                kind: ErrorKind::Transport("connection refused".to_string())
            }
        );
    }

    #[test]
    fn refused_redirect_is_distinct_from_transport_failure() {
        let out = classify(
            Err(SendError::Redirected("redirect to /next refused".to_string())),
            Duration::ZERO,
        );
        assert_eq!(
            out,
            WorkOutcome::Failure {
                kind: ErrorKind::Redirected
            }
        );
        assert!(!out.is_success());
    }

    #[test]
    fn header_estimate_counts_names_once_and_every_value() {
        let mut headers = http::HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        // content-type: 12 + 4 + 10, set-cookie: 10 + 4 + 3 + 3, trailer: 2
        assert_eq!(estimate_header_bytes(&headers), 26 + 20 + 2);
    }

    #[test]
    fn header_estimate_of_empty_map_is_the_blank_line() {
        assert_eq!(estimate_header_bytes(&http::HeaderMap::new()), 2);

        let mut headers = http::HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/"));
        assert_eq!(estimate_header_bytes(&headers), 8 + 4 + 1 + 2);
    }

    #[test]
    fn error_class_labels() {
        assert_eq!(ErrorKind::Redirected.class().to_string(), "redirected");
        assert_eq!(ErrorKind::HttpStatus(503).class().to_string(), "http_status");
        assert_eq!(
            ErrorKind::Transport("x".to_string()).class().to_string(),
            "transport"
        );
    }
}
